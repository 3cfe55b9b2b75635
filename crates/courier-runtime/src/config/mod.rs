//! Runtime configuration: schema, layered loading and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    BackoffConfig, BotConfig, ConversationConfig, CourierConfig, LogFormat, LogLevel, LogOutput,
    LogRotation, LoggingConfig, PollingConfig, SpanEventConfig, UpdaterConfig, UpdaterMode,
    WebhookConfig,
};
pub use validation::validate_config;
