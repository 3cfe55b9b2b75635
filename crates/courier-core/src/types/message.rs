//! The message record and its content classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::{Chat, User};
use super::media::{Animation, Audio, Document, Game, PhotoSize, Sticker, Video, VideoNote, Voice};
use super::payment::{Invoice, SuccessfulPayment};
use super::query::Poll;

/// A formatting or semantic span inside a text or caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    /// Entity type, e.g. `"bot_command"`, `"mention"`, `"url"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units.
    pub offset: usize,
    /// Length in UTF-16 code units.
    pub length: usize,
}

/// A message.
///
/// Mirrors the wire record: almost every field is optional and at most one
/// content field is normally present. Use [`Message::content_kind`] to
/// classify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Sender; absent for channel posts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// Sender chat, for messages sent on behalf of a chat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_chat: Option<Chat>,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<MessageEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_entities: Vec<MessageEntity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<Game>,
    /// Available sizes of a photo, smallest first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker: Option<Sticker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_note: Option<VideoNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_chat_members: Option<Vec<User>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_chat_member: Option<User>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_payment: Option<SuccessfulPayment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    /// Origin of a forwarded message, kept raw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_origin: Option<Value>,
    /// Legacy forward marker still sent by some servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_date: Option<i64>,
}

/// Classification of what a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Audio,
    Document,
    Animation,
    Game,
    Photo,
    Sticker,
    Video,
    Voice,
    VideoNote,
    Poll,
    NewChatMembers,
    LeftChatMember,
    Invoice,
    SuccessfulPayment,
    /// Anything not modeled above (service messages, locations, …).
    Other,
}

impl Message {
    /// Creates a bare text message, mostly useful in tests and demos.
    pub fn text(message_id: i64, chat: Chat, from: Option<User>, text: impl Into<String>) -> Self {
        Self {
            message_id,
            from,
            sender_chat: None,
            date: 0,
            chat,
            edit_date: None,
            text: Some(text.into()),
            entities: Vec::new(),
            caption: None,
            caption_entities: Vec::new(),
            audio: None,
            document: None,
            animation: None,
            game: None,
            photo: None,
            sticker: None,
            video: None,
            voice: None,
            video_note: None,
            poll: None,
            new_chat_members: None,
            left_chat_member: None,
            invoice: None,
            successful_payment: None,
            reply_to_message: None,
            forward_origin: None,
            forward_date: None,
        }
    }

    /// Classifies the message by its first present content field.
    ///
    /// Animations also carry a `document` field on the wire, so the animation
    /// check comes first.
    pub fn content_kind(&self) -> ContentKind {
        if self.text.is_some() {
            ContentKind::Text
        } else if self.animation.is_some() {
            ContentKind::Animation
        } else if self.audio.is_some() {
            ContentKind::Audio
        } else if self.document.is_some() {
            ContentKind::Document
        } else if self.game.is_some() {
            ContentKind::Game
        } else if self.photo.is_some() {
            ContentKind::Photo
        } else if self.sticker.is_some() {
            ContentKind::Sticker
        } else if self.video.is_some() {
            ContentKind::Video
        } else if self.voice.is_some() {
            ContentKind::Voice
        } else if self.video_note.is_some() {
            ContentKind::VideoNote
        } else if self.poll.is_some() {
            ContentKind::Poll
        } else if self.new_chat_members.is_some() {
            ContentKind::NewChatMembers
        } else if self.left_chat_member.is_some() {
            ContentKind::LeftChatMember
        } else if self.invoice.is_some() {
            ContentKind::Invoice
        } else if self.successful_payment.is_some() {
            ContentKind::SuccessfulPayment
        } else {
            ContentKind::Other
        }
    }

    /// Returns the text, falling back to the caption.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// Returns `true` when the text looks like a bot command.
    pub fn is_command(&self) -> bool {
        self.text
            .as_deref()
            .is_some_and(|t| t.starts_with('/') && t.len() > 1)
    }

    /// Returns `true` for forwarded messages.
    pub fn is_forwarded(&self) -> bool {
        self.forward_origin.is_some() || self.forward_date.is_some()
    }

    /// Returns `true` for edited messages.
    pub fn is_edited(&self) -> bool {
        self.edit_date.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatKind;

    fn chat() -> Chat {
        Chat {
            id: 1,
            kind: ChatKind::Private,
            title: None,
            username: None,
            first_name: Some("Ann".into()),
            last_name: None,
        }
    }

    #[test]
    fn test_content_kind_from_wire() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "message_id": 7,
            "date": 0,
            "chat": {"id": 1, "type": "group", "title": "g"},
            "animation": {"file_id": "a", "file_unique_id": "au"},
            "document": {"file_id": "a", "file_unique_id": "au"},
        }))
        .unwrap();
        assert_eq!(msg.content_kind(), ContentKind::Animation);

        let msg: Message = serde_json::from_value(serde_json::json!({
            "message_id": 8,
            "chat": {"id": 1, "type": "group"},
            "new_chat_members": [{"id": 3, "first_name": "Bo"}],
        }))
        .unwrap();
        assert_eq!(msg.content_kind(), ContentKind::NewChatMembers);
    }

    #[test]
    fn test_text_helpers() {
        let mut msg = Message::text(1, chat(), None, "/start now");
        assert!(msg.is_command());
        assert_eq!(msg.text_or_caption(), Some("/start now"));

        msg.text = None;
        msg.caption = Some("look".into());
        assert!(!msg.is_command());
        assert_eq!(msg.text_or_caption(), Some("look"));
        assert_eq!(msg.content_kind(), ContentKind::Other);
    }

    #[test]
    fn test_lone_slash_is_not_command() {
        assert!(!Message::text(1, chat(), None, "/").is_command());
    }
}
