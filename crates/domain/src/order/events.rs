//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed.
    OrderCreated(OrderCreatedData),

    /// Order was approved after payment.
    OrderApproved(OrderApprovedData),

    /// Order was rejected.
    OrderRejected(OrderRejectedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::OrderApproved(_) => "OrderApproved",
            OrderEvent::OrderRejected(_) => "OrderRejected",
        }
    }
}

impl OrderEvent {
    /// Returns the order this event belongs to.
    pub fn order_id(&self) -> &AggregateId {
        match self {
            OrderEvent::OrderCreated(data) => &data.order_id,
            OrderEvent::OrderApproved(data) => &data.order_id,
            OrderEvent::OrderRejected(data) => &data.order_id,
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub product_id: AggregateId,
    pub user_id: String,
    pub quantity: u32,
    pub address_id: String,
    pub created_at: DateTime<Utc>,
}

/// Data for OrderApproved event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderApprovedData {
    pub order_id: AggregateId,
    pub approved_at: DateTime<Utc>,
}

/// Data for OrderRejected event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejectedData {
    pub order_id: AggregateId,

    /// Human-readable reason carried through from the failing step.
    pub reason: String,

    pub rejected_at: DateTime<Utc>,
}
