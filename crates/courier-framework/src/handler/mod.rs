//! Handlers: the units of work the dispatcher routes updates to.
//!
//! Every handler answers two questions: does this update concern me
//! ([`Handler::matches`]), and what do I do with it ([`Handler::handle`]).
//! The variants in this module cover the update shapes of the remote API;
//! each one unwraps its payload and hands it to a user action of the form
//! `Fn(Context, Payload) -> impl Future<Output = HandlerResult>`.
//!
//! ```rust,ignore
//! use courier_framework::{CommandHandler, TextHandler};
//!
//! let start = CommandHandler::new(["start"], |ctx, _cmd| async move {
//!     ctx.reply("hello!").await?;
//!     Ok(())
//! });
//!
//! let echo = TextHandler::new(|ctx, input| async move {
//!     ctx.reply(&input.text).await?;
//!     Ok(())
//! })
//! .group("echo");
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{Message, Update, UpdateKind};
use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::HandlerResult;

/// Group tag used when a handler is not assigned one.
pub const DEFAULT_GROUP: &str = "default";

/// Adds the `.group(tag)` builder to a handler type with a `group` field.
macro_rules! group_builder {
    ($ty:ident $(<$($gen:ident),+>)?) => {
        impl $(<$($gen),+>)? $ty $(<$($gen),+>)? {
            /// Assigns the handler to a group.
            pub fn group(mut self, tag: impl Into<String>) -> Self {
                self.group = tag.into();
                self
            }
        }
    };
}

mod callback;
mod channel_post;
mod command;
mod conversation;
mod filtered;
mod generic;
mod media;
mod membership;
mod payload;
mod payment;
mod text;

#[cfg(feature = "command")]
mod parsed;

pub use callback::CallbackQueryHandler;
pub use channel_post::{ChannelPost, ChannelPostHandler};
pub use command::{CommandHandler, CommandInput, parse_command};
pub use conversation::ConversationHandler;
pub use filtered::{FilteredHandler, HandlerExt};
pub use generic::GenericHandler;
pub use media::{Media, MediaHandler, MediaKind};
pub use membership::{Membership, MembershipHandler, MembershipKind};
pub use payload::{
    ChosenInlineResultHandler, InlineQueryHandler, PollAnswerHandler, PollHandler,
    PreCheckoutQueryHandler, ShippingQueryHandler,
};
pub use payment::PaymentHandler;
pub use text::{TextHandler, TextInput, TextMatch};

#[cfg(feature = "command")]
pub use parsed::{ParsedCommandHandler, shell_split};

/// A unit of work the dispatcher can route updates to.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str {
        "handler"
    }

    /// The group this handler belongs to.
    fn group(&self) -> &str;

    /// Returns `true` if this handler applies to `update`.
    ///
    /// Must be free of side effects and must return `false`, never panic,
    /// when the payload it looks for is absent.
    fn matches(&self, update: &Update) -> bool;

    /// Runs the handler. Only called after `matches` returned `true` for the
    /// same update.
    async fn handle(&self, ctx: Context) -> HandlerResult;
}

/// A shared handler trait object.
pub type BoxedHandler = Arc<dyn Handler>;

/// A type-erased handler action.
pub type Action<P> = Arc<dyn Fn(Context, P) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Boxes a closure into an [`Action`].
pub fn action<P, F, Fut>(f: F) -> Action<P>
where
    P: Send + 'static,
    F: Fn(Context, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx, payload| Box::pin(f(ctx, payload)))
}

/// Returns the message of a plain (optionally edited) message update.
///
/// Channel posts and callback messages are left to their own handlers.
pub(crate) fn incoming_message(update: &Update, allow_edited: bool) -> Option<&Message> {
    match &update.kind {
        UpdateKind::Message(m) => Some(m),
        UpdateKind::EditedMessage(m) if allow_edited => Some(m),
        _ => None,
    }
}
