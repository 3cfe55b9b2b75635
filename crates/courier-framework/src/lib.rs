//! # Courier Framework
//!
//! The update-dispatch engine of the Courier bot SDK.
//!
//! This layer provides:
//! - [`Filter`]: composable predicates over messages
//! - [`Handler`] and its variants, one per update shape, plus the generic,
//!   filtered and multi-turn [`ConversationHandler`] variants
//! - [`HandlerRegistry`]: handler groups and their routing order
//! - [`Dispatcher`]: the queue, the consumption loop and error routing
//! - [`ChainStore`]: per-user conversation state
//! - Clap-based argument parsing for commands (with the `command` feature)

pub mod chain;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod handler;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{ChainStore, ChainToken, DEFAULT_CHAIN_CAPACITY, DEFAULT_CHAIN_TTL};
pub use context::Context;
pub use dispatcher::{
    DispatchReport, Dispatcher, DispatcherHandle, ErrorHandler, HandledBy, Incoming,
};
pub use error::{DispatchError, Failure, HandlerError, HandlerResult};
pub use filter::Filter;
pub use handler::{
    Action, BoxedHandler, CallbackQueryHandler, ChannelPost, ChannelPostHandler,
    ChosenInlineResultHandler, CommandHandler, CommandInput, ConversationHandler, DEFAULT_GROUP,
    FilteredHandler, GenericHandler, Handler, HandlerExt, InlineQueryHandler, Media, MediaHandler,
    MediaKind, Membership, MembershipHandler, MembershipKind, PaymentHandler, PollAnswerHandler,
    PollHandler, PreCheckoutQueryHandler, ShippingQueryHandler, TextHandler, TextInput, TextMatch,
    action, parse_command,
};
pub use registry::{HandlerGroup, HandlerRegistry};

#[cfg(feature = "command")]
pub use handler::{ParsedCommandHandler, shell_split};
