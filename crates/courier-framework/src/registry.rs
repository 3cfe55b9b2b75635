//! Handler groups and the routing order.
//!
//! The registry is an ordered list of groups, each an ordered list of
//! handlers. For every update the dispatcher walks the groups in the order
//! they were first registered; inside a group the first handler whose
//! `matches` returns `true` takes the update and the rest of that group is
//! skipped. Other groups still see the update.
//!
//! The registry is cheap to clone: groups sit behind an `Arc` and are
//! copied only when a clone is modified, so the dispatcher can take a
//! snapshot per update without holding a lock across handler calls.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use courier_core::Update;
use tracing::trace;

use crate::error::panic_message;
use crate::handler::BoxedHandler;

/// One named group of handlers.
#[derive(Clone)]
pub struct HandlerGroup {
    tag: String,
    handlers: Vec<BoxedHandler>,
}

impl HandlerGroup {
    /// Returns the group tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the handlers in registration order.
    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    /// Returns the first handler matching `update`.
    ///
    /// A panicking `matches` counts as no match; `on_panic` is told about it
    /// and the scan continues with the next handler.
    pub fn find_match(
        &self,
        update: &Update,
        mut on_panic: impl FnMut(&BoxedHandler, String),
    ) -> Option<&BoxedHandler> {
        for handler in &self.handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.matches(update))) {
                Ok(true) => return Some(handler),
                Ok(false) => {
                    trace!(group = %self.tag, handler = handler.name(), "Handler did not match");
                }
                Err(payload) => on_panic(handler, panic_message(payload.as_ref())),
            }
        }
        None
    }
}

impl std::fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("tag", &self.tag)
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

/// Ordered collection of handler groups.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    groups: Arc<Vec<HandlerGroup>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to its group, creating the group at the end if new.
    pub fn register(&mut self, handler: BoxedHandler) {
        let groups = Arc::make_mut(&mut self.groups);
        let tag = handler.group().to_string();
        match groups.iter_mut().find(|g| g.tag == tag) {
            Some(group) => group.handlers.push(handler),
            None => groups.push(HandlerGroup {
                tag,
                handlers: vec![handler],
            }),
        }
    }

    /// Returns the groups in routing order.
    pub fn groups(&self) -> &[HandlerGroup] {
        &self.groups
    }

    /// Looks up a group by tag.
    pub fn group(&self, tag: &str) -> Option<&HandlerGroup> {
        self.groups.iter().find(|g| g.tag == tag)
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of handlers across groups.
    pub fn handler_count(&self) -> usize {
        self.groups.iter().map(|g| g.handlers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.groups.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{GenericHandler, TextHandler};
    use crate::testing::text_update;

    fn generic(group: &str) -> BoxedHandler {
        Arc::new(GenericHandler::new(|_ctx, _u| async { Ok(()) }).group(group))
    }

    #[test]
    fn test_groups_keep_first_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.register(generic("b"));
        registry.register(generic("a"));
        registry.register(generic("b"));

        let tags: Vec<_> = registry.groups().iter().map(|g| g.tag()).collect();
        assert_eq!(tags, vec!["b", "a"]);
        assert_eq!(registry.group("b").unwrap().handlers().len(), 2);
        assert_eq!(registry.handler_count(), 3);
    }

    #[test]
    fn test_clone_is_copy_on_write() {
        let mut registry = HandlerRegistry::new();
        registry.register(generic("a"));
        let snapshot = registry.clone();
        registry.register(generic("a"));
        assert_eq!(snapshot.handler_count(), 1);
        assert_eq!(registry.handler_count(), 2);
    }

    #[test]
    fn test_find_match_picks_first_in_order() {
        let mut registry = HandlerRegistry::new();
        let text: BoxedHandler = Arc::new(TextHandler::new(|_ctx, _t| async { Ok(()) }).contains("zzz"));
        let first = generic("default");
        registry.register(text);
        registry.register(Arc::clone(&first));
        registry.register(generic("default"));

        let group = &registry.groups()[0];
        let found = group.find_match(&text_update(1, 1, "hello"), |_, _| {}).unwrap();
        assert!(Arc::ptr_eq(found, &first));
    }

    #[test]
    fn test_find_match_survives_panicking_matcher() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(
            GenericHandler::new(|_ctx, _u| async { Ok(()) }).when(|_| panic!("broken predicate")),
        ));
        registry.register(generic("default"));

        let mut panics = Vec::new();
        let found = registry.groups()[0]
            .find_match(&text_update(1, 1, "x"), |_, msg| panics.push(msg));
        assert!(found.is_some());
        assert_eq!(panics, vec!["broken predicate".to_string()]);
    }
}
