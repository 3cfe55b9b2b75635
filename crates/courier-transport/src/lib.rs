//! # Courier Transport
//!
//! Network implementations of the capabilities defined in `courier-core`.
//!
//! ## Features
//!
//! - `http-client`: [`HttpBotApi`], implementing `Bot` and `UpdateSource`
//!   on top of reqwest
//! - `http-server`: [`WebhookServer`], an axum receiver feeding an
//!   `UpdateSink`
//! - `full`: both
//!
//! ```text
//! ┌──────────────────────┐
//! │  courier-runtime     │  (updater, orchestration)
//! ├──────────────────────┤
//! │  courier-core        │  (Bot, UpdateSource, UpdateSink)
//! ├──────────────────────┤
//! │  courier-transport   │  <- This crate
//! ├──────────────────────┤
//! │  Network (HTTPS)     │
//! └──────────────────────┘
//! ```

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

#[cfg(feature = "http-client")]
pub use http::{DEFAULT_API_URL, HttpBotApi, HttpBotApiBuilder};

#[cfg(feature = "http-server")]
pub use http::{SECRET_HEADER, WebhookHandle, WebhookServer, WebhookServerConfig};
