//! Handlers for update kinds whose payload is delivered as-is.

use std::future::Future;

use async_trait::async_trait;
use courier_core::{
    ChosenInlineResult, InlineQuery, Poll, PollAnswer, PreCheckoutQuery, ShippingQuery, Update,
    UpdateKind,
};

use super::{Action, DEFAULT_GROUP, Handler, action};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

macro_rules! payload_handler {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $payload:ty, $label:literal) => {
        $(#[$doc])*
        pub struct $name {
            group: String,
            action: Action<$payload>,
        }

        impl $name {
            pub fn new<F, Fut>(f: F) -> Self
            where
                F: Fn(Context, $payload) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = HandlerResult> + Send + 'static,
            {
                Self {
                    group: DEFAULT_GROUP.to_string(),
                    action: action(f),
                }
            }
        }

        group_builder!($name);

        #[async_trait]
        impl Handler for $name {
            fn name(&self) -> &str {
                $label
            }

            fn group(&self) -> &str {
                &self.group
            }

            fn matches(&self, update: &Update) -> bool {
                matches!(update.kind, UpdateKind::$variant(_))
            }

            async fn handle(&self, ctx: Context) -> HandlerResult {
                let payload = match &ctx.update().kind {
                    UpdateKind::$variant(payload) => payload.clone(),
                    _ => return Err(HandlerError::MissingPayload($label)),
                };
                (self.action)(ctx, payload).await
            }
        }
    };
}

payload_handler!(
    /// Handles poll state updates.
    PollHandler, Poll, Poll, "poll"
);
payload_handler!(
    /// Handles answers in non-anonymous polls.
    PollAnswerHandler, PollAnswer, PollAnswer, "poll_answer"
);
payload_handler!(
    /// Handles pre-checkout queries. The action is expected to answer them.
    PreCheckoutQueryHandler, PreCheckoutQuery, PreCheckoutQuery, "pre_checkout_query"
);
payload_handler!(
    /// Handles shipping queries for flexible-price invoices.
    ShippingQueryHandler, ShippingQuery, ShippingQuery, "shipping_query"
);
payload_handler!(
    /// Handles inline queries.
    InlineQueryHandler, InlineQuery, InlineQuery, "inline_query"
);
payload_handler!(
    /// Handles chosen inline results.
    ChosenInlineResultHandler, ChosenInlineResult, ChosenInlineResult, "chosen_inline_result"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBot, text_update, user};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn inline_update(query: &str) -> Update {
        Update::new(
            9,
            UpdateKind::InlineQuery(InlineQuery {
                id: "iq".into(),
                from: user(3, None),
                query: query.into(),
                offset: String::new(),
                chat_type: None,
            }),
        )
    }

    #[test]
    fn test_matches_by_kind() {
        let inline = InlineQueryHandler::new(|_ctx, _q| async { Ok(()) });
        let poll = PollHandler::new(|_ctx, _p| async { Ok(()) });
        assert!(inline.matches(&inline_update("cats")));
        assert!(!inline.matches(&text_update(1, 1, "cats")));
        assert!(!poll.matches(&inline_update("cats")));
        assert_eq!(inline.name(), "inline_query");
    }

    #[tokio::test]
    async fn test_delivers_payload() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let handler = InlineQueryHandler::new(move |_ctx, q| {
            let flag = Arc::clone(&flag);
            async move {
                assert_eq!(q.query, "cats");
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        });
        handler
            .handle(Context::new(MockBot::new(), Arc::new(inline_update("cats"))))
            .await
            .unwrap();
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_wrong_payload_is_an_error() {
        let handler = ShippingQueryHandler::new(|_ctx, _q| async { Ok(()) });
        let result = handler
            .handle(Context::new(MockBot::new(), Arc::new(text_update(1, 1, "x"))))
            .await;
        assert!(matches!(result, Err(HandlerError::MissingPayload("shipping_query"))));
    }
}
