//! Order service.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult, RetryPolicy};
use crate::error::DomainError;

use super::{ApproveOrder, CreateOrder, Order, RejectOrder};

/// Service for managing orders.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: S, retry: RetryPolicy) -> Self {
        Self {
            handler: CommandHandler::with_retry_policy(store, retry),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn create_order(
        &self,
        cmd: CreateOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(&cmd.order_id, |order| {
                order.create(
                    &cmd.order_id,
                    &cmd.product_id,
                    &cmd.user_id,
                    cmd.quantity,
                    &cmd.address_id,
                )
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn approve_order(
        &self,
        cmd: ApproveOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(&cmd.order_id, |order| order.approve(&cmd.order_id))
            .await
    }

    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn reject_order(
        &self,
        cmd: RejectOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(&cmd.order_id, |order| order.reject(&cmd.order_id, &cmd.reason))
            .await
    }

    /// Loads an order by ID. Returns None if the order doesn't exist.
    pub async fn get_order(&self, order_id: &AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }
}
