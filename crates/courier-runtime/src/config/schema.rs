//! Configuration schema definitions.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration for polling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub bot: BotConfig,
    pub updater: UpdaterConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// [bot]
// =============================================================================

/// Credentials and endpoint of the remote API.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot token issued by the platform, e.g. `123456:ABC-DEF`.
    pub token: String,
    /// Base URL of the API; the token and method name are appended.
    pub api_url: String,
    /// Timeout for ordinary API calls. Long polls add their own timeout.
    pub request_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl BotConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Keeps the token out of logs.
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

// =============================================================================
// [updater]
// =============================================================================

/// How updates reach the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdaterMode {
    /// Long polling through `getUpdates`.
    #[default]
    Polling,
    /// Updates are pushed to us, by the webhook server or by the host
    /// application.
    Webhook,
}

impl fmt::Display for UpdaterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Polling => "polling",
            Self::Webhook => "webhook",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    pub mode: UpdaterMode,
    pub polling: PollingConfig,
    pub webhook: WebhookConfig,
}

/// Long-polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Maximum updates per batch (1-100).
    pub limit: u32,
    /// Long-poll timeout in seconds.
    pub timeout_secs: u32,
    /// Update kinds to receive; empty means the server default.
    pub allowed_updates: Vec<String>,
    /// Skip updates that queued up while the bot was offline.
    pub drop_pending_updates: bool,
    pub backoff: BackoffConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            timeout_secs: 30,
            allowed_updates: Vec::new(),
            drop_pending_updates: false,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Delay between failed fetches, growing geometrically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// Webhook receiver settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Local address the receiver binds to.
    pub listen: String,
    /// Path the platform posts updates to.
    pub path: String,
    /// Public URL registered with the platform. When unset the webhook is
    /// assumed to be registered out of band.
    pub public_url: Option<String>,
    /// Value the platform echoes in `X-Telegram-Bot-Api-Secret-Token`.
    pub secret_token: Option<String>,
    pub max_connections: Option<u32>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8443".to_string(),
            path: "/webhook".to_string(),
            public_url: None,
            secret_token: None,
            max_connections: None,
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("listen", &self.listen)
            .field("path", &self.path)
            .field("public_url", &self.public_url)
            .field("secret_token", &self.secret_token.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

// =============================================================================
// [conversation]
// =============================================================================

/// Limits of the per-user conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Idle time after which a conversation is forgotten; 0 disables expiry.
    pub ttl_secs: u64,
    /// Upper bound on stored conversations.
    pub max_entries: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_entries: 10_000,
        }
    }
}

impl ConversationConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

// =============================================================================
// [logging]
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Required when `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Per-target levels, e.g. `courier_framework = "debug"`.
    pub filters: HashMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    pub file_location: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CourierConfig::default();
        assert_eq!(config.updater.mode, UpdaterMode::Polling);
        assert_eq!(config.updater.polling.limit, 100);
        assert_eq!(config.conversation.ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_document() {
        let config: CourierConfig = serde_json::from_value(serde_json::json!({
            "updater": { "mode": "webhook", "webhook": { "path": "/hook" } },
            "conversation": { "ttl_secs": 0 }
        }))
        .unwrap();
        assert_eq!(config.updater.mode, UpdaterMode::Webhook);
        assert_eq!(config.updater.webhook.path, "/hook");
        assert_eq!(config.updater.webhook.listen, "0.0.0.0:8443");
        assert_eq!(config.conversation.ttl(), None);
        assert_eq!(config.conversation.max_entries, 10_000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = CourierConfig::default();
        config.bot.token = "123:secret".into();
        config.updater.webhook.secret_token = Some("hush".into());
        let printed = format!("{config:?}");
        assert!(!printed.contains("123:secret"));
        assert!(!printed.contains("hush"));
    }
}
