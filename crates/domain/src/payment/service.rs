//! Payment service.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult, RetryPolicy};
use crate::error::DomainError;

use super::{Payment, ProcessPayment};

/// Service for processing payments.
pub struct PaymentService<S: EventStore> {
    handler: CommandHandler<S, Payment>,
}

impl<S: EventStore> PaymentService<S> {
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: S, retry: RetryPolicy) -> Self {
        Self {
            handler: CommandHandler::with_retry_policy(store, retry),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Payment> {
        &self.handler
    }

    // Card details stay out of the span.
    #[tracing::instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, order_id = %cmd.order_id))]
    pub async fn process_payment(
        &self,
        cmd: ProcessPayment,
    ) -> Result<CommandResult<Payment>, DomainError> {
        self.handler
            .execute(&cmd.payment_id, |payment| {
                payment.process(&cmd.payment_id, &cmd.order_id, &cmd.details)
            })
            .await
    }

    pub async fn get_payment(
        &self,
        payment_id: &AggregateId,
    ) -> Result<Option<Payment>, DomainError> {
        self.handler.load_existing(payment_id).await
    }
}
