//! Payment domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::PaymentDetails;

/// Events that can occur on a payment aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    /// The payment for an order went through.
    PaymentProcessed(PaymentProcessedData),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentProcessed(_) => "PaymentProcessed",
        }
    }
}

/// Data for PaymentProcessed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProcessedData {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub details: PaymentDetails,
    pub processed_at: DateTime<Utc>,
}
