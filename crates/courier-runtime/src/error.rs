//! Runtime error types.

use courier_core::ApiError;
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors of the update ingestion side.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// A pushed payload was not a valid update.
    #[error("Failed to decode update: {0}")]
    Decode(#[from] serde_json::Error),

    /// The dispatcher queue is gone.
    #[error("Dispatcher queue closed")]
    QueueClosed,

    #[error("Polling requires an update source")]
    NoSource,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors of the runtime orchestration.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Updater(#[from] UpdaterError),

    #[error("Remote API call failed: {0}")]
    Api(#[from] ApiError),

    /// No bot was supplied and none could be built from configuration.
    #[error("No bot configured: {0}")]
    NoBot(String),

    #[error("Webhook server error: {0}")]
    Webhook(String),
}

pub type UpdaterResult<T> = Result<T, UpdaterError>;

pub type RuntimeResult<T> = Result<T, RuntimeError>;
