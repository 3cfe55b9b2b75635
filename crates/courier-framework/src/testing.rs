//! Test fixtures shared by the unit tests of this crate.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    ApiError, ApiResult, Bot, CallbackQuery, Chat, ChatKind, Message, Update, UpdateKind, User,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// A bot that records every call and answers with canned results.
pub struct MockBot {
    calls: Mutex<Vec<(String, Value)>>,
    fail: bool,
}

impl MockBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    /// A bot whose every call fails with `ApiError::NotConnected`.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> &str {
        "mock"
    }

    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
        self.calls.lock().push((method.to_string(), params.clone()));
        if self.fail {
            return Err(ApiError::NotConnected);
        }
        match method {
            "sendMessage" => Ok(json!({
                "message_id": 1000,
                "chat": {"id": params["chat_id"], "type": "private"},
                "text": params["text"],
            })),
            _ => Ok(Value::Bool(true)),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub fn user(id: i64, username: Option<&str>) -> User {
    User {
        id,
        is_bot: false,
        first_name: format!("user{id}"),
        last_name: None,
        username: username.map(str::to_string),
        language_code: None,
    }
}

pub fn private_chat(id: i64) -> Chat {
    Chat {
        id,
        kind: ChatKind::Private,
        title: None,
        username: None,
        first_name: None,
        last_name: None,
    }
}

/// A text message from user `user_id` in their private chat.
pub fn text_message(message_id: i64, user_id: i64, text: &str) -> Message {
    Message::text(
        message_id,
        private_chat(user_id),
        Some(user(user_id, None)),
        text,
    )
}

/// A message update whose id doubles as the message id.
pub fn text_update(update_id: i64, user_id: i64, text: &str) -> Update {
    Update::new(
        update_id,
        UpdateKind::Message(text_message(update_id, user_id, text)),
    )
}

pub fn message_update(update_id: i64, message: Message) -> Update {
    Update::new(update_id, UpdateKind::Message(message))
}

pub fn callback_update(update_id: i64, user_id: i64, data: &str) -> Update {
    Update::new(
        update_id,
        UpdateKind::CallbackQuery(CallbackQuery {
            id: format!("cb{update_id}"),
            from: user(user_id, None),
            message: None,
            inline_message_id: None,
            chat_instance: "ci".into(),
            data: Some(data.to_string()),
            game_short_name: None,
        }),
    )
}
