//! HTTP transport: the API client and the webhook receiver.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{DEFAULT_API_URL, HttpBotApi, HttpBotApiBuilder};

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{SECRET_HEADER, WebhookHandle, WebhookServer, WebhookServerConfig};
