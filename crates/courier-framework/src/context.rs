//! The per-invocation handler context.
//!
//! One [`Context`] is built per handler invocation. It shares the update with
//! every other handler run for the same update, while the `consumed` flag is
//! fresh for each invocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use courier_core::{BoxedBot, Message, Update};

use crate::error::{HandlerError, HandlerResult};

/// Context handed to handler actions.
#[derive(Clone)]
pub struct Context {
    bot: BoxedBot,
    update: Arc<Update>,
    /// Set by [`Context::consume`]; read by conversation handlers.
    consumed: Arc<AtomicBool>,
}

impl Context {
    /// Creates a context for one handler invocation.
    pub fn new(bot: BoxedBot, update: Arc<Update>) -> Self {
        Self {
            bot,
            update,
            consumed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the bot capability.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// Returns the update being handled.
    pub fn update(&self) -> &Update {
        &self.update
    }

    /// Returns a shared handle to the update.
    pub fn update_arc(&self) -> Arc<Update> {
        Arc::clone(&self.update)
    }

    /// Returns the chat the update happened in.
    pub fn chat_id(&self) -> Option<i64> {
        self.update.chat().map(|c| c.id)
    }

    /// Returns the user that produced the update.
    pub fn sender_id(&self) -> Option<i64> {
        self.update.sender_id()
    }

    /// Sends a text message to the update's chat.
    pub async fn reply(&self, text: &str) -> HandlerResult<Message> {
        let chat_id = self.chat_id().ok_or(HandlerError::MissingPayload("chat"))?;
        Ok(self.bot.send_message(chat_id, text).await?)
    }

    /// Marks the update as consumed.
    ///
    /// A conversation handler starts a conversation only when its entry
    /// action calls this.
    pub fn consume(&self) {
        self.consumed.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if [`consume`](Self::consume) was called.
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("bot", &self.bot.id())
            .field("update_id", &self.update.id)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBot, text_update};

    #[tokio::test]
    async fn test_reply_targets_update_chat() {
        let bot = MockBot::new();
        let ctx = Context::new(bot.clone(), Arc::new(text_update(1, 77, "hi")));
        ctx.reply("hello").await.unwrap();

        let calls = bot.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(calls[0].1["chat_id"], 77);
        assert_eq!(calls[0].1["text"], "hello");
    }

    #[test]
    fn test_consume_flag_is_shared_by_clones() {
        let ctx = Context::new(MockBot::new(), Arc::new(text_update(1, 1, "x")));
        let clone = ctx.clone();
        assert!(!ctx.is_consumed());
        clone.consume();
        assert!(ctx.is_consumed());
    }
}
