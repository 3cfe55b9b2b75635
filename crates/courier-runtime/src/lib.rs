//! Courier Runtime - orchestration layer for the Courier bot SDK.
//!
//! This crate provides:
//! - Layered configuration (`CourierConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`)
//! - Update ingestion by polling or push (`Updater`)
//! - Process orchestration (`CourierRuntime`)
//!
//! # Transports
//!
//! - `http-client`: without an explicit bot, the runtime builds an HTTP API
//!   client from the `[bot]` section and polls through it
//! - `http-server`: webhook mode binds a receiver on `updater.webhook.listen`
//!
//! ```ignore
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::builder().build()?;
//!     runtime.register(my_handler);
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod updater;

pub use config::{ConfigLoader, CourierConfig, load_config, validate_config};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult, UpdaterError, UpdaterResult};
pub use logging::LoggingBuilder;
pub use runtime::{CourierRuntime, RuntimeBuilder};
pub use updater::{Backoff, PollingOptions, Updater};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
