use std::future::Future;

use async_trait::async_trait;
use courier_core::{Message, Update, UpdateKind};

use super::{Action, DEFAULT_GROUP, Handler, action};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

/// Payload of a [`ChannelPostHandler`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPost {
    pub message: Message,
    /// `true` for edits of an earlier post.
    pub edited: bool,
}

/// Handles new and edited channel posts.
pub struct ChannelPostHandler {
    group: String,
    action: Action<ChannelPost>,
}

impl ChannelPostHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, ChannelPost) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }
}

group_builder!(ChannelPostHandler);

#[async_trait]
impl Handler for ChannelPostHandler {
    fn name(&self) -> &str {
        "channel_post"
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        matches!(
            update.kind,
            UpdateKind::ChannelPost(_) | UpdateKind::EditedChannelPost(_)
        )
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let post = match &ctx.update().kind {
            UpdateKind::ChannelPost(m) => ChannelPost {
                message: m.clone(),
                edited: false,
            },
            UpdateKind::EditedChannelPost(m) => ChannelPost {
                message: m.clone(),
                edited: true,
            },
            _ => return Err(HandlerError::MissingPayload("channel_post")),
        };
        (self.action)(ctx, post).await
    }
}
