//! # Courier
//!
//! An SDK for bots speaking a Telegram-style HTTP API, built around an
//! update-dispatch engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  courier                      │  <- facade, prelude
//! ├───────────────────────────────────────────────┤
//! │              courier-runtime                  │  <- config, logging, updater
//! ├───────────────────────┬───────────────────────┤
//! │  courier-framework    │  courier-transport    │  <- dispatch │ HTTP
//! ├───────────────────────┴───────────────────────┤
//! │                courier-core                   │  <- entities, Bot trait
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::builder().build()?;
//!
//!     runtime.register(CommandHandler::new(["start"], |ctx, _| async move {
//!         ctx.reply("Hello!").await?;
//!         Ok(())
//!     }));
//!     runtime.register(TextHandler::new(|ctx, input| async move {
//!         ctx.reply(&input.text).await?;
//!         Ok(())
//!     }));
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `command` (default): clap-parsed command arguments
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `http-client` (default): the HTTPS API client, used for polling
//! - `http-server`: the webhook receiver
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

/// Commonly used types for writing bots.
pub mod prelude {
    pub use courier_runtime::prelude::*;
    pub use courier_runtime::{ConfigLoader, CourierConfig, CourierRuntime, RuntimeBuilder};

    // Entities
    pub use courier_core::{
        CallbackQuery, Chat, ChatKind, Message, Update, UpdateKind, User,
    };

    // Outbound calls
    pub use courier_core::{ApiError, BoxedBot, Bot, CallbackAnswer, downcast_bot};

    // Dispatch
    pub use courier_framework::{
        CallbackQueryHandler, ChainStore, ChainToken, ChannelPostHandler, CommandHandler,
        CommandInput, Context, ConversationHandler, Failure, Filter, GenericHandler, Handler,
        HandlerError, HandlerExt, HandlerResult, MediaHandler, MembershipHandler, PaymentHandler,
        TextHandler, TextInput,
    };

    #[cfg(feature = "command")]
    pub use courier_framework::ParsedCommandHandler;
}
