//! Product domain events.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Money;

/// Events that can occur on a product aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    /// Product was added to the catalogue with its initial stock.
    ProductCreated(ProductCreatedData),

    /// Stock was set aside for an order.
    ProductReserved(ProductReservedData),

    /// A reservation was released and its stock returned.
    ProductReservationCancelled(ProductReservationCancelledData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "ProductCreated",
            ProductEvent::ProductReserved(_) => "ProductReserved",
            ProductEvent::ProductReservationCancelled(_) => "ProductReservationCancelled",
        }
    }
}

/// Data for ProductCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreatedData {
    pub product_id: AggregateId,
    pub title: String,
    pub price: Money,
    pub quantity: u32,
}

/// Data for ProductReserved event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductReservedData {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: String,
    pub quantity: u32,
}

/// Data for ProductReservationCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductReservationCancelledData {
    pub product_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: String,

    /// Quantity returned to stock; always the quantity that was reserved.
    pub quantity: u32,

    pub reason: String,
}
