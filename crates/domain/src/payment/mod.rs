//! Payment aggregate and related types.

mod aggregate;
mod commands;
mod details;
mod events;
mod service;

pub use aggregate::Payment;
pub use commands::ProcessPayment;
pub use details::PaymentDetails;
pub use events::{PaymentEvent, PaymentProcessedData};
pub use service::PaymentService;

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment {payment_id} was already processed for order {order_id}")]
    AlreadyProcessed {
        payment_id: AggregateId,
        order_id: AggregateId,
    },

    #[error("Order ID is required")]
    MissingOrderId,

    #[error("Invalid payment details: {0}")]
    InvalidPaymentDetails(String),
}
