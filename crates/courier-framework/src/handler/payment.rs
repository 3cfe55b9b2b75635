use std::future::Future;

use async_trait::async_trait;
use courier_core::{SuccessfulPayment, Update};

use super::{Action, DEFAULT_GROUP, Handler, action, incoming_message};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

/// Handles the service message sent after a completed payment.
pub struct PaymentHandler {
    group: String,
    action: Action<SuccessfulPayment>,
}

impl PaymentHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Context, SuccessfulPayment) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }
}

group_builder!(PaymentHandler);

#[async_trait]
impl Handler for PaymentHandler {
    fn name(&self) -> &str {
        "successful_payment"
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        incoming_message(update, false).is_some_and(|m| m.successful_payment.is_some())
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let payment = incoming_message(ctx.update(), false)
            .and_then(|m| m.successful_payment.clone())
            .ok_or(HandlerError::MissingPayload("successful_payment"))?;
        (self.action)(ctx, payment).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{message_update, text_message, text_update};

    #[test]
    fn test_matches_successful_payment() {
        let handler = PaymentHandler::new(|_ctx, _p| async { Ok(()) });
        let mut message = text_message(1, 1, "");
        message.text = None;
        message.successful_payment = Some(SuccessfulPayment {
            currency: "EUR".into(),
            total_amount: 500,
            invoice_payload: "order-1".into(),
            telegram_payment_charge_id: "t".into(),
            provider_payment_charge_id: "p".into(),
        });
        assert!(handler.matches(&message_update(1, message)));
        assert!(!handler.matches(&text_update(2, 1, "paid")));
    }
}
