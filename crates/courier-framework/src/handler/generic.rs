use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::Update;

use super::{Action, DEFAULT_GROUP, Handler, action};
use crate::context::Context;
use crate::error::HandlerResult;

type UpdatePredicate = Arc<dyn Fn(&Update) -> bool + Send + Sync>;

/// Catch-all handler receiving the raw update.
///
/// Without a predicate it matches every update, which makes it a natural
/// fallback at the end of a group or a logger in a group of its own.
pub struct GenericHandler {
    predicate: Option<UpdatePredicate>,
    group: String,
    action: Action<Arc<Update>>,
}

impl GenericHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            predicate: None,
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }

    /// Restricts the handler to updates satisfying `predicate`.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Update) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }
}

group_builder!(GenericHandler);

#[async_trait]
impl Handler for GenericHandler {
    fn name(&self) -> &str {
        "generic"
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(update))
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let update = ctx.update_arc();
        (self.action)(ctx, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{callback_update, text_update};

    #[test]
    fn test_matches_everything_by_default() {
        let handler = GenericHandler::new(|_ctx, _u| async { Ok(()) });
        assert!(handler.matches(&text_update(1, 1, "x")));
        assert!(handler.matches(&callback_update(2, 1, "y")));
    }

    #[test]
    fn test_predicate() {
        let handler = GenericHandler::new(|_ctx, _u| async { Ok(()) }).when(|u| u.id % 2 == 0);
        assert!(!handler.matches(&text_update(1, 1, "x")));
        assert!(handler.matches(&text_update(2, 1, "x")));
    }
}
