//! Bot API client over HTTPS.
//!
//! Every method is a `POST {api_url}/bot{token}/{method}` with a JSON body.
//! Responses use the envelope
//! `{ "ok": bool, "result": ..., "description": ..., "error_code": ...,
//! "parameters": { "retry_after": ... } }`.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{ApiError, ApiResult, Bot, GetUpdates, Update, UpdateSource};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

/// Default base URL of the remote API.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Extra time granted to a long poll on top of its server-side timeout.
const POLL_MARGIN: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    result: Option<Value>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Turns a raw HTTP response into the `result` value or an [`ApiError`].
pub(crate) fn decode_response(status: u16, body: &[u8]) -> ApiResult<Value> {
    let envelope: Envelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(ApiError::InvalidResponse(e.to_string()));
        }
        Err(_) => {
            return Err(ApiError::Api {
                code: i64::from(status),
                description: String::from_utf8_lossy(body).trim().to_string(),
            });
        }
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| ApiError::InvalidResponse("ok response without result".into()));
    }

    if let Some(secs) = envelope.parameters.and_then(|p| p.retry_after) {
        return Err(ApiError::RetryAfter(secs));
    }
    Err(ApiError::Api {
        code: envelope.error_code.unwrap_or(i64::from(status)),
        description: envelope.description.unwrap_or_default(),
    })
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        // The URL embeds the token.
        ApiError::transport(err.without_url().to_string())
    }
}

/// Builder for [`HttpBotApi`].
#[derive(Debug)]
pub struct HttpBotApiBuilder {
    token: String,
    api_url: String,
    request_timeout: Duration,
    client: Option<Client>,
}

impl HttpBotApiBuilder {
    /// Overrides the API base URL, e.g. for a self-hosted API server.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Timeout for ordinary calls. Long polls add their own timeout on top.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Uses a preconfigured reqwest client.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> ApiResult<HttpBotApi> {
        let id = match self.token.split_once(':') {
            Some((id, secret)) if !id.is_empty() && !secret.is_empty() => id.to_string(),
            _ => return Err(ApiError::Other("malformed bot token".into())),
        };
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .build()
                .map_err(map_reqwest_error)?,
        };
        let base = format!("{}/bot{}", self.api_url.trim_end_matches('/'), self.token);
        Ok(HttpBotApi {
            client,
            base,
            id,
            request_timeout: self.request_timeout,
        })
    }
}

/// The remote API reached over HTTP.
///
/// Implements both [`Bot`] for outbound calls and [`UpdateSource`] for long
/// polling.
///
/// ```rust,ignore
/// let api = HttpBotApi::builder(token)
///     .request_timeout(Duration::from_secs(15))
///     .build()?;
/// let me = api.get_me().await?;
/// ```
#[derive(Clone)]
pub struct HttpBotApi {
    client: Client,
    base: String,
    id: String,
    request_timeout: Duration,
}

impl HttpBotApi {
    /// Creates a client for `token` with default settings.
    pub fn new(token: impl Into<String>) -> ApiResult<Self> {
        Self::builder(token).build()
    }

    pub fn builder(token: impl Into<String>) -> HttpBotApiBuilder {
        HttpBotApiBuilder {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            client: None,
        }
    }

    async fn request(&self, method: &str, params: &Value, timeout: Duration) -> ApiResult<Value> {
        trace!(bot = %self.id, method, "API request");
        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let result = decode_response(status, &body);
        if let Err(e) = &result {
            debug!(bot = %self.id, method, status, error = %e, "API request failed");
        }
        result
    }
}

impl std::fmt::Debug for HttpBotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBotApi")
            .field("id", &self.id)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bot for HttpBotApi {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
        self.request(method, &params, self.request_timeout).await
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[async_trait]
impl UpdateSource for HttpBotApi {
    async fn get_updates(&self, params: &GetUpdates) -> ApiResult<Vec<Update>> {
        let body = serde_json::to_value(params)?;
        let timeout = self.request_timeout + Duration::from_secs(u64::from(params.timeout)) + POLL_MARGIN;
        let result = self.request("getUpdates", &body, timeout).await?;
        decode_updates(result)
    }
}

/// Decodes a `getUpdates` result entry by entry.
///
/// Entries without an `update_id` cannot be acknowledged and are dropped;
/// everything else is delivered, unknown shapes as `UpdateKind::Unknown`.
pub(crate) fn decode_updates(result: Value) -> ApiResult<Vec<Update>> {
    let entries: Vec<Value> = serde_json::from_value(result)?;
    let mut updates = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Update>(entry) {
            Ok(update) => updates.push(update),
            Err(e) => warn!(error = %e, "Dropping undecodable update"),
        }
    }
    Ok(updates)
}
