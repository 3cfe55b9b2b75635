//! Unified error types for the Courier core.
//!
//! Framework-level errors (handler and dispatch failures) live in
//! `courier-framework`; runtime and configuration errors live in
//! `courier-runtime`.

use thiserror::Error;

// =============================================================================
// API Errors
// =============================================================================

/// Error type for remote API calls and update fetches.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, TLS…).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// No connection to the remote API is available.
    #[error("bot is not connected")]
    NotConnected,

    /// The remote API answered with `ok: false`.
    #[error("API error ({code}): {description}")]
    Api {
        /// Error code reported by the API (usually mirrors the HTTP status).
        code: i64,
        /// Human-readable description reported by the API.
        description: String,
    },

    /// Flood control: the API asked us to wait before retrying.
    #[error("flood control exceeded, retry after {0}s")]
    RetryAfter(u64),

    /// A payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The response did not follow the expected envelope.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The capability is not available on this bot.
    #[error("operation '{0}' is not supported")]
    NotSupported(&'static str),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Returns `true` for errors worth retrying without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout | Self::NotConnected | Self::RetryAfter(_)
        ) || matches!(self, Self::Api { code, .. } if *code >= 500)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Returned when pushing into an [`UpdateSink`](crate::UpdateSink) whose
/// consumer has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("update sink is closed")]
pub struct SinkClosed;

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::RetryAfter(3).is_transient());
        assert!(
            ApiError::Api {
                code: 502,
                description: "Bad Gateway".into()
            }
            .is_transient()
        );
        assert!(
            !ApiError::Api {
                code: 401,
                description: "Unauthorized".into()
            }
            .is_transient()
        );
        assert!(!ApiError::Serialization("eof".into()).is_transient());
    }
}
