//! # Courier Core
//!
//! Shared vocabulary of the Courier bot SDK.
//!
//! - **Entity model**: [`Update`] with its [`UpdateKind`] sum type and the
//!   records it carries ([`Message`], [`CallbackQuery`], …)
//! - **Outbound capability**: the [`Bot`] trait, implemented by transports
//! - **Inbound seams**: [`UpdateSource`] for polling and [`UpdateSink`] for
//!   handing updates to a dispatcher
//! - **Errors**: [`ApiError`] and [`SinkClosed`]
//!
//! ```text
//! ┌──────────────┐ get_updates ┌─────────┐ push_update ┌────────────┐
//! │ UpdateSource │────────────▶│ Updater │────────────▶│ UpdateSink │
//! └──────────────┘             └─────────┘             └────────────┘
//!                                                            │
//!                             ┌─────┐   call_api     ┌──────────┐
//!                             │ Bot │◀───────────────│ Handlers │
//!                             └─────┘                └──────────┘
//! ```

pub mod bot;
pub mod error;
pub mod source;
pub mod types;

pub use bot::{BoxedBot, Bot, CallbackAnswer, WebhookParams, downcast_bot};
pub use error::{ApiError, ApiResult, SinkClosed};
pub use source::{BoxedUpdateSink, BoxedUpdateSource, GetUpdates, UpdateSink, UpdateSource};
pub use types::*;
