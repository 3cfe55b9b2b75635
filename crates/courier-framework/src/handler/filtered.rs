use async_trait::async_trait;
use courier_core::Update;

use super::Handler;
use crate::context::Context;
use crate::error::HandlerResult;
use crate::filter::Filter;

/// Wraps a handler with an extra [`Filter`] over the update's message.
///
/// Updates without a message never match.
pub struct FilteredHandler<H> {
    inner: H,
    filter: Filter,
}

impl<H: Handler> FilteredHandler<H> {
    pub fn new(inner: H, filter: Filter) -> Self {
        Self { inner, filter }
    }

    /// Returns the wrapped handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: Handler> Handler for FilteredHandler<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn group(&self) -> &str {
        self.inner.group()
    }

    fn matches(&self, update: &Update) -> bool {
        self.inner.matches(update) && update.message().is_some_and(|m| self.filter.matches(m))
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        self.inner.handle(ctx).await
    }
}

/// Extension methods available on every handler.
pub trait HandlerExt: Handler + Sized {
    /// Adds a message filter in front of this handler.
    fn with_filter(self, filter: Filter) -> FilteredHandler<Self> {
        FilteredHandler::new(self, filter)
    }
}

impl<H: Handler> HandlerExt for H {}
