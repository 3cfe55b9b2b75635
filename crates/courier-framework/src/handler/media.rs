use std::future::Future;

use async_trait::async_trait;
use courier_core::{
    Animation, Audio, Document, Game, Message, PhotoSize, Sticker, Update, Video, VideoNote,
    Voice,
};

use super::{Action, DEFAULT_GROUP, Handler, action, incoming_message};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

/// Which media field a [`MediaHandler`] reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Photo,
    Video,
    Voice,
    Document,
    Sticker,
    Animation,
    Game,
    VideoNote,
}

/// The unwrapped media payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Media {
    Audio(Audio),
    /// All available sizes, smallest first.
    Photo(Vec<PhotoSize>),
    Video(Video),
    Voice(Voice),
    Document(Document),
    Sticker(Sticker),
    Animation(Animation),
    Game(Game),
    VideoNote(VideoNote),
}

impl MediaKind {
    fn extract(self, message: &Message) -> Option<Media> {
        match self {
            Self::Audio => message.audio.clone().map(Media::Audio),
            Self::Photo => message.photo.clone().map(Media::Photo),
            Self::Video => message.video.clone().map(Media::Video),
            Self::Voice => message.voice.clone().map(Media::Voice),
            Self::Document => message.document.clone().map(Media::Document),
            Self::Sticker => message.sticker.clone().map(Media::Sticker),
            Self::Animation => message.animation.clone().map(Media::Animation),
            Self::Game => message.game.clone().map(Media::Game),
            Self::VideoNote => message.video_note.clone().map(Media::VideoNote),
        }
    }

    fn is_present(self, message: &Message) -> bool {
        match self {
            Self::Audio => message.audio.is_some(),
            Self::Photo => message.photo.is_some(),
            Self::Video => message.video.is_some(),
            Self::Voice => message.voice.is_some(),
            Self::Document => message.document.is_some(),
            Self::Sticker => message.sticker.is_some(),
            Self::Animation => message.animation.is_some(),
            Self::Game => message.game.is_some(),
            Self::VideoNote => message.video_note.is_some(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::Animation => "animation",
            Self::Game => "game",
            Self::VideoNote => "video_note",
        }
    }
}

/// Handles messages carrying one kind of media.
pub struct MediaHandler {
    kind: MediaKind,
    group: String,
    action: Action<Media>,
}

impl MediaHandler {
    pub fn new<F, Fut>(kind: MediaKind, f: F) -> Self
    where
        F: Fn(Context, Media) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            kind,
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }

    /// Returns the media kind this handler reacts to.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

group_builder!(MediaHandler);

#[async_trait]
impl Handler for MediaHandler {
    fn name(&self) -> &str {
        self.kind.label()
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        incoming_message(update, false).is_some_and(|m| self.kind.is_present(m))
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let media = incoming_message(ctx.update(), false)
            .and_then(|m| self.kind.extract(m))
            .ok_or(HandlerError::MissingPayload(self.kind.label()))?;
        (self.action)(ctx, media).await
    }
}
