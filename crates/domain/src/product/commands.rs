//! Product commands.

use common::AggregateId;

use crate::command::Command;
use crate::value_objects::Money;

use super::Product;

/// Command to add a product to the catalogue.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub product_id: AggregateId,
    pub title: String,
    pub price: Money,
    pub quantity: u32,
}

impl CreateProduct {
    pub fn new(
        product_id: AggregateId,
        title: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            title: title.into(),
            price,
            quantity,
        }
    }
}

impl Command for CreateProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> &AggregateId {
        &self.product_id
    }

    fn command_type(&self) -> &'static str {
        "CreateProduct"
    }
}

/// Command to reserve stock for an order.
#[derive(Debug, Clone)]
pub struct ReserveProduct {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: String,
    pub quantity: u32,
}

impl ReserveProduct {
    pub fn new(
        product_id: AggregateId,
        order_id: AggregateId,
        user_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            order_id,
            user_id: user_id.into(),
            quantity,
        }
    }
}

impl Command for ReserveProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> &AggregateId {
        &self.product_id
    }

    fn command_type(&self) -> &'static str {
        "ReserveProduct"
    }
}

/// Command to release an order's reservation.
#[derive(Debug, Clone)]
pub struct CancelProductReservation {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: String,
    pub quantity: u32,
    pub reason: String,
}

impl CancelProductReservation {
    pub fn new(
        product_id: AggregateId,
        order_id: AggregateId,
        user_id: impl Into<String>,
        quantity: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            order_id,
            user_id: user_id.into(),
            quantity,
            reason: reason.into(),
        }
    }
}

impl Command for CancelProductReservation {
    type Aggregate = Product;

    fn aggregate_id(&self) -> &AggregateId {
        &self.product_id
    }

    fn command_type(&self) -> &'static str {
        "CancelProductReservation"
    }
}
