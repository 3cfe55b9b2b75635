use std::future::Future;

use async_trait::async_trait;
use courier_core::Update;

use super::{Action, DEFAULT_GROUP, Handler, action, incoming_message};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

/// How a [`TextHandler`] compares the message text.
///
/// Comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// Any non-empty text.
    Any,
    /// The text contains the needle.
    Contains(String),
    /// The text equals the needle.
    Equals(String),
}

/// Payload of a [`TextHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInput {
    pub text: String,
}

/// Handles free-form text messages.
pub struct TextHandler {
    pattern: TextMatch,
    skip_commands: bool,
    allow_edited: bool,
    group: String,
    action: Action<TextInput>,
}

impl TextHandler {
    /// Creates a handler for any non-empty text.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, TextInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            pattern: TextMatch::Any,
            skip_commands: false,
            allow_edited: false,
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }

    /// Only matches text containing `needle`.
    pub fn contains(mut self, needle: impl Into<String>) -> Self {
        self.pattern = TextMatch::Contains(needle.into().to_lowercase());
        self
    }

    /// Only matches text equal to `needle`.
    pub fn equals(mut self, needle: impl Into<String>) -> Self {
        self.pattern = TextMatch::Equals(needle.into().to_lowercase());
        self
    }

    /// Leaves `/command` messages to command handlers.
    pub fn skip_commands(mut self, skip: bool) -> Self {
        self.skip_commands = skip;
        self
    }

    /// Also reacts to edited messages.
    pub fn allow_edited(mut self, allow: bool) -> Self {
        self.allow_edited = allow;
        self
    }

    fn text<'a>(&self, update: &'a Update) -> Option<&'a str> {
        let text = incoming_message(update, self.allow_edited)?
            .text
            .as_deref()
            .filter(|t| !t.is_empty())?;
        if self.skip_commands && text.starts_with('/') {
            return None;
        }
        let accepted = match &self.pattern {
            TextMatch::Any => true,
            TextMatch::Contains(needle) => text.to_lowercase().contains(needle.as_str()),
            TextMatch::Equals(needle) => text.to_lowercase() == *needle,
        };
        accepted.then_some(text)
    }
}

group_builder!(TextHandler);

#[async_trait]
impl Handler for TextHandler {
    fn name(&self) -> &str {
        "text"
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        self.text(update).is_some()
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let text = self
            .text(ctx.update())
            .ok_or(HandlerError::MissingPayload("text"))?
            .to_string();
        (self.action)(ctx, TextInput { text }).await
    }
}
