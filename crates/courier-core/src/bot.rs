//! The outbound capability.
//!
//! [`Bot`] represents an authenticated connection to the remote API. Every
//! typed helper is a thin wrapper over [`Bot::call_api`], so a transport only
//! has to implement that one method.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::types::{Message, User};

/// Options for answering a callback query.
///
/// The default answer carries no text and simply stops the client's loading
/// indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAnswer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub show_alert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<u32>,
}

impl CallbackAnswer {
    /// Creates an empty answer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the notification text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Shows the text as an alert instead of a toast.
    pub fn show_alert(mut self, show: bool) -> Self {
        self.show_alert = show;
        self
    }

    /// Sets a URL for the client to open.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets how long, in seconds, the client may cache the answer.
    pub fn cache_time(mut self, secs: u32) -> Self {
        self.cache_time = Some(secs);
        self
    }
}

/// Parameters for registering a webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookParams {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub drop_pending_updates: bool,
}

/// The outbound API capability.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Returns an identifier for logging, typically the bot's username or id.
    fn id(&self) -> &str;

    /// Invokes a remote method with JSON parameters and returns the raw
    /// `result` value.
    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value>;

    /// Sends a text message and returns the sent message.
    async fn send_message(&self, chat_id: i64, text: &str) -> ApiResult<Message> {
        let value = self
            .call_api("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Answers a callback query.
    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        answer: &CallbackAnswer,
    ) -> ApiResult<()> {
        let mut params = serde_json::to_value(answer)?;
        match params.as_object_mut() {
            Some(obj) => {
                obj.insert("callback_query_id".into(), Value::from(callback_query_id));
            }
            None => return Err(ApiError::Serialization("callback answer is not an object".into())),
        }
        self.call_api("answerCallbackQuery", params).await?;
        Ok(())
    }

    /// Returns the bot's own account.
    async fn get_me(&self) -> ApiResult<User> {
        let value = self.call_api("getMe", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Registers a webhook URL with the remote API.
    async fn set_webhook(&self, params: &WebhookParams) -> ApiResult<()> {
        self.call_api("setWebhook", serde_json::to_value(params)?)
            .await?;
        Ok(())
    }

    /// Removes any registered webhook so polling can be used.
    async fn delete_webhook(&self, drop_pending_updates: bool) -> ApiResult<()> {
        self.call_api(
            "deleteWebhook",
            json!({ "drop_pending_updates": drop_pending_updates }),
        )
        .await?;
        Ok(())
    }

    /// Returns self as an `Arc<dyn Any>` for downcasting to the concrete
    /// transport. Implementors return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared bot trait object.
pub type BoxedBot = Arc<dyn Bot>;

/// Attempts to downcast a [`BoxedBot`] to a concrete type.
pub fn downcast_bot<T: Bot + 'static>(bot: BoxedBot) -> Option<Arc<T>> {
    bot.as_any().downcast::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Bot for Recorder {
        fn id(&self) -> &str {
            "recorder"
        }

        async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
            self.calls.lock().unwrap().push((method.to_string(), params));
            Ok(Value::Bool(true))
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[tokio::test]
    async fn test_answer_callback_query_params() {
        let bot = Recorder {
            calls: Mutex::new(Vec::new()),
        };
        bot.answer_callback_query("q1", &CallbackAnswer::new().text("done").cache_time(5))
            .await
            .unwrap();

        let calls = bot.calls.lock().unwrap();
        assert_eq!(calls[0].0, "answerCallbackQuery");
        assert_eq!(
            calls[0].1,
            json!({"callback_query_id": "q1", "text": "done", "cache_time": 5})
        );
    }

    #[tokio::test]
    async fn test_delete_webhook_params() {
        let bot = Recorder {
            calls: Mutex::new(Vec::new()),
        };
        bot.delete_webhook(true).await.unwrap();
        let calls = bot.calls.lock().unwrap();
        assert_eq!(calls[0], ("deleteWebhook".into(), json!({"drop_pending_updates": true})));
    }

    #[test]
    fn test_downcast_bot() {
        let bot: BoxedBot = Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
        });
        assert!(downcast_bot::<Recorder>(bot).is_some());
    }
}
