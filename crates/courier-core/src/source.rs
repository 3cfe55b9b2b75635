//! Inbound seams: fetching batches and pushing single updates.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult, SinkClosed};
use crate::types::Update;

/// Parameters of one long-poll fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetUpdates {
    /// Identifier of the first update to return. Earlier updates are
    /// acknowledged by the server.
    pub offset: i64,
    /// Maximum batch size (1-100).
    pub limit: u32,
    /// Long-poll timeout in seconds; 0 means short polling.
    pub timeout: u32,
    /// Update kinds to receive; empty means the server default.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_updates: Vec<String>,
}

impl Default for GetUpdates {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
            timeout: 30,
            allowed_updates: Vec::new(),
        }
    }
}

/// The fetch-a-batch capability used by polling.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches the next batch, waiting up to `params.timeout` seconds.
    async fn get_updates(&self, params: &GetUpdates) -> ApiResult<Vec<Update>>;
}

/// Where ingestion hands decoded updates and ingestion failures.
///
/// Pushing never blocks; an error means the consumer is gone.
pub trait UpdateSink: Send + Sync {
    /// Enqueues one update.
    fn push_update(&self, update: Update) -> Result<(), SinkClosed>;

    /// Reports a failure that happened before any update could be produced.
    fn push_failure(&self, error: ApiError) -> Result<(), SinkClosed>;
}

/// A shared update source.
pub type BoxedUpdateSource = Arc<dyn UpdateSource>;

/// A shared update sink.
pub type BoxedUpdateSink = Arc<dyn UpdateSink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_updates_serialization() {
        let params = GetUpdates {
            offset: 8,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({"offset": 8, "limit": 100, "timeout": 30})
        );
    }
}
