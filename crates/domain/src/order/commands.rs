//! Order commands.

use common::AggregateId;

use crate::command::Command;

use super::Order;

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: AggregateId,
    pub product_id: AggregateId,
    pub user_id: String,
    pub quantity: u32,
    pub address_id: String,
}

impl CreateOrder {
    pub fn new(
        order_id: AggregateId,
        product_id: impl Into<AggregateId>,
        user_id: impl Into<String>,
        quantity: u32,
        address_id: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            product_id: product_id.into(),
            user_id: user_id.into(),
            quantity,
            address_id: address_id.into(),
        }
    }
}

impl Command for CreateOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn command_type(&self) -> &'static str {
        "CreateOrder"
    }
}

/// Command to approve an order once payment went through.
#[derive(Debug, Clone)]
pub struct ApproveOrder {
    pub order_id: AggregateId,
}

impl ApproveOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for ApproveOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn command_type(&self) -> &'static str {
        "ApproveOrder"
    }
}

/// Command to reject an order.
#[derive(Debug, Clone)]
pub struct RejectOrder {
    pub order_id: AggregateId,
    pub reason: String,
}

impl RejectOrder {
    pub fn new(order_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

impl Command for RejectOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> &AggregateId {
        &self.order_id
    }

    fn command_type(&self) -> &'static str {
        "RejectOrder"
    }
}
