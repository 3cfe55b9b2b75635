//! Webhook receiver.
//!
//! Accepts `POST {path}` requests carrying one update each and hands them to
//! an [`UpdateSink`]. When a secret token is configured, requests must echo
//! it in the `X-Telegram-Bot-Api-Secret-Token` header.
//!
//! | Outcome | Status |
//! |---|---|
//! | queued | 200 |
//! | malformed body | 400 |
//! | missing or wrong secret | 401 |
//! | dispatcher gone | 503 |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use courier_core::{BoxedUpdateSink, Update};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Header carrying the webhook secret.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Settings of the webhook receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8443`. Port 0 picks a free port.
    pub listen: String,
    pub path: String,
    pub secret_token: Option<String>,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8443".to_string(),
            path: "/webhook".to_string(),
            secret_token: None,
        }
    }
}

struct WebhookState {
    sink: BoxedUpdateSink,
    secret_token: Option<String>,
}

pub(crate) fn router(path: &str, sink: BoxedUpdateSink, secret_token: Option<String>) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    Router::new()
        .route(&path, post(receive))
        .with_state(Arc::new(WebhookState { sink, secret_token }))
}

async fn receive(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = &state.secret_token {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            warn!("Rejected webhook request with a missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            debug!(error = %e, len = body.len(), "Rejected malformed webhook payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    trace!(update_id = update.id, kind = update.kind_name(), "Webhook update received");
    match state.sink.push_update(update) {
        Ok(()) => StatusCode::OK,
        Err(_) => {
            error!("Dispatcher queue closed, refusing webhook update");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Binds and serves webhook requests.
pub struct WebhookServer;

impl WebhookServer {
    /// Binds `config.listen` and starts serving in the background.
    pub async fn bind(config: &WebhookServerConfig, sink: BoxedUpdateSink) -> std::io::Result<WebhookHandle> {
        let listener = TcpListener::bind(&config.listen).await?;
        let local_addr = listener.local_addr()?;
        let app = router(&config.path, sink, config.secret_token.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "Webhook server error");
            }
        });

        info!(addr = %local_addr, path = %config.path, "Webhook server listening");
        Ok(WebhookHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// A running webhook server.
///
/// Dropping the handle stops the server as well, without waiting for it.
pub struct WebhookHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WebhookHandle {
    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting requests and waits for in-flight ones to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = %e, "Webhook server task failed");
        }
        info!(addr = %self.local_addr, "Webhook server stopped");
    }
}

impl std::fmt::Debug for WebhookHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookHandle")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
