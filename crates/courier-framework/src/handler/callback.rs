use std::future::Future;
use std::panic::{AssertUnwindSafe, resume_unwind};

use async_trait::async_trait;
use courier_core::{CallbackAnswer, CallbackQuery, Update, UpdateKind};
use futures::FutureExt;
use tracing::warn;

use super::{Action, DEFAULT_GROUP, Handler, action};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

/// Handles inline keyboard button presses.
///
/// After the action finishes, successfully, with an error or by panicking,
/// the handler answers the query exactly once with the configured [`CallbackAnswer`] so the client
/// stops showing a loading indicator. This is the only handler with a
/// built-in outbound call.
pub struct CallbackQueryHandler {
    data_contains: Option<String>,
    answer: CallbackAnswer,
    group: String,
    action: Action<CallbackQuery>,
}

impl CallbackQueryHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, CallbackQuery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            data_contains: None,
            answer: CallbackAnswer::default(),
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }

    /// Only matches queries whose data contains `needle` (case-sensitive).
    pub fn data_contains(mut self, needle: impl Into<String>) -> Self {
        self.data_contains = Some(needle.into());
        self
    }

    /// Sets the answer sent after the action.
    pub fn answer(mut self, answer: CallbackAnswer) -> Self {
        self.answer = answer;
        self
    }

    fn query<'a>(&self, update: &'a Update) -> Option<&'a CallbackQuery> {
        let UpdateKind::CallbackQuery(query) = &update.kind else {
            return None;
        };
        match &self.data_contains {
            None => Some(query),
            Some(needle) => query
                .data
                .as_deref()
                .is_some_and(|d| d.contains(needle.as_str()))
                .then_some(query),
        }
    }
}

group_builder!(CallbackQueryHandler);

#[async_trait]
impl Handler for CallbackQueryHandler {
    fn name(&self) -> &str {
        "callback_query"
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        self.query(update).is_some()
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let query = self
            .query(ctx.update())
            .cloned()
            .ok_or(HandlerError::MissingPayload("callback_query"))?;
        let query_id = query.id.clone();
        let bot = ctx.bot().clone();

        let action = &self.action;
        let outcome = AssertUnwindSafe(async move { action(ctx, query).await })
            .catch_unwind()
            .await;
        let answered = bot.answer_callback_query(&query_id, &self.answer).await;

        // The panic is re-raised once the answer is out; the dispatcher
        // reports it like any other panicking handler.
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => {
                if let Err(e) = &answered {
                    warn!(query_id = %query_id, error = %e, "Failed to answer callback query");
                }
                resume_unwind(payload)
            }
        };

        match (outcome, answered) {
            (Err(err), Err(answer_err)) => {
                warn!(query_id = %query_id, error = %answer_err, "Failed to answer callback query");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), answered) => Ok(answered?),
        }
    }
}
