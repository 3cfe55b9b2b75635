use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::Update;
use futures::future::BoxFuture;
use tracing::{debug, trace};

use super::Handler;
use crate::chain::{ChainStore, ChainToken};
use crate::context::Context;
use crate::error::HandlerResult;

type TokenFn = Arc<dyn Fn(&Update) -> ChainToken + Send + Sync>;
type Continuation =
    Arc<dyn Fn(Context, ChainToken) -> BoxFuture<'static, HandlerResult<Option<ChainToken>>> + Send + Sync>;

/// A multi-turn handler.
///
/// The first turn goes through the `entry` handler. If its action calls
/// [`Context::consume`], a token is generated for the sender and stored. From
/// then on every update from that sender is routed to the continuation,
/// which returns the next token (conversation continues) or `None`
/// (conversation ends, state removed).
///
/// ```rust,ignore
/// let signup = ConversationHandler::new(
///     CommandHandler::new(["signup"], |ctx, _| async move {
///         ctx.reply("What's your name?").await?;
///         ctx.consume();
///         Ok(())
///     }),
///     |_update| ChainToken::from("name"),
///     |ctx, token| async move {
///         match token.as_str() {
///             "name" => { ctx.reply("And your age?").await?; Ok(Some("age".into())) }
///             _ => { ctx.reply("Thanks!").await?; Ok(None) }
///         }
///     },
/// );
/// ```
pub struct ConversationHandler<H> {
    entry: H,
    token_fn: TokenFn,
    continuation: Continuation,
    store: ChainStore,
    group: Option<String>,
}

impl<H: Handler> ConversationHandler<H> {
    pub fn new<T, F, Fut>(entry: H, token_fn: T, continuation: F) -> Self
    where
        T: Fn(&Update) -> ChainToken + Send + Sync + 'static,
        F: Fn(Context, ChainToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<ChainToken>>> + Send + 'static,
    {
        Self {
            entry,
            token_fn: Arc::new(token_fn),
            continuation: Arc::new(move |ctx, token| Box::pin(continuation(ctx, token))),
            store: ChainStore::new(),
            group: None,
        }
    }

    /// Uses `store` instead of a private store.
    pub fn store(mut self, store: ChainStore) -> Self {
        self.store = store;
        self
    }

    /// Overrides the group, which otherwise follows the entry handler.
    pub fn group(mut self, tag: impl Into<String>) -> Self {
        self.group = Some(tag.into());
        self
    }

    /// Returns the state store.
    pub fn chain_store(&self) -> &ChainStore {
        &self.store
    }
}

#[async_trait]
impl<H: Handler> Handler for ConversationHandler<H> {
    fn name(&self) -> &str {
        self.entry.name()
    }

    fn group(&self) -> &str {
        self.group.as_deref().unwrap_or_else(|| self.entry.group())
    }

    fn matches(&self, update: &Update) -> bool {
        update
            .sender_id()
            .is_some_and(|user| self.store.contains(user))
            || self.entry.matches(update)
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let sender = ctx.sender_id();

        if let Some(user) = sender
            && let Some(token) = self.store.get(user)
        {
            trace!(user, token = %token, "Continuing conversation");
            match (self.continuation)(ctx, token).await? {
                Some(next) => self.store.insert(user, next),
                None => {
                    self.store.remove(user);
                    debug!(user, "Conversation finished");
                }
            }
            return Ok(());
        }

        // The stored token may have expired between `matches` and now.
        if !self.entry.matches(ctx.update()) {
            return Ok(());
        }

        self.entry.handle(ctx.clone()).await?;
        if ctx.is_consumed() {
            match sender {
                Some(user) => {
                    let token = (self.token_fn)(ctx.update());
                    debug!(user, token = %token, "Conversation started");
                    self.store.insert(user, token);
                }
                None => debug!("Entry consumed an update without sender, no conversation started"),
            }
        }
        Ok(())
    }
}
