//! Error types for handlers and the dispatcher.

use std::sync::Arc;

use courier_core::{ApiError, Update};
use thiserror::Error;

/// Error returned by a handler action.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// An outbound call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The update did not carry the payload the handler expected.
    #[error("update has no {0} payload")]
    MissingPayload(&'static str),

    /// Any other failure raised by user code.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wraps an arbitrary error.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Other(err.into())
    }
}

/// Result type returned by handler actions.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// What went wrong in one failure reported to the error handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler action returned an error.
    #[error("handler '{handler}' failed: {source}")]
    Handler {
        handler: String,
        #[source]
        source: HandlerError,
    },

    /// A handler panicked while matching or running.
    #[error("handler '{handler}' panicked: {message}")]
    Panicked { handler: String, message: String },

    /// Fetching updates failed before any update was produced.
    #[error("update ingestion failed: {0}")]
    Ingestion(#[source] ApiError),
}

/// A failure routed to the error handler.
#[derive(Debug)]
pub struct Failure {
    /// The update being processed, if the failure happened during dispatch.
    pub update: Option<Arc<Update>>,
    /// Group of the failing handler, if any.
    pub group: Option<String>,
    /// The error itself.
    pub error: DispatchError,
}

impl Failure {
    /// Creates an ingestion failure, which has no update or group.
    pub fn ingestion(error: ApiError) -> Self {
        Self {
            update: None,
            group: None,
            error: DispatchError::Ingestion(error),
        }
    }

    /// Returns `true` if the failure came from the ingestion side.
    pub fn is_ingestion(&self) -> bool {
        matches!(self.error, DispatchError::Ingestion(_))
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.update, &self.group) {
            (Some(update), Some(group)) => {
                write!(f, "update {} in group '{}': {}", update.id, group, self.error)
            }
            (Some(update), None) => write!(f, "update {}: {}", update.id, self.error),
            _ => write!(f, "{}", self.error),
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
