//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::Order;
pub use commands::{ApproveOrder, CreateOrder, RejectOrder};
pub use events::{OrderApprovedData, OrderCreatedData, OrderEvent, OrderRejectedData};
pub use service::OrderService;
pub use state::OrderStatus;

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No order with this ID has been created.
    #[error("Order {order_id} does not exist")]
    NotFound { order_id: AggregateId },

    /// An order with this ID already exists.
    #[error("Order {order_id} already exists")]
    AlreadyCreated { order_id: AggregateId },

    /// A required field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The order already reached the other terminal status.
    #[error("Cannot {action} an order that is {current}")]
    InvalidStatusTransition {
        current: OrderStatus,
        action: &'static str,
    },
}
