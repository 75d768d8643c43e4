//! Event-sourced aggregates for order fulfillment.
//!
//! - [`Aggregate`], [`DomainEvent`] and [`SnapshotCapable`] describe how state
//!   is folded from committed events
//! - [`CommandHandler`] loads, validates and appends with optimistic retry
//! - Order, Product and Payment aggregates with their services

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;
pub mod payment;
pub mod product;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use command::{Command, CommandHandler, CommandResult, RetryPolicy};
pub use error::DomainError;
pub use order::{
    ApproveOrder, CreateOrder, Order, OrderError, OrderEvent, OrderService, OrderStatus,
    RejectOrder,
};
pub use payment::{
    Payment, PaymentDetails, PaymentError, PaymentEvent, PaymentService, ProcessPayment,
};
pub use product::{
    CancelProductReservation, CreateProduct, InMemoryProductLookup, Product, ProductError,
    ProductEvent, ProductLookup, ProductLookupEntry, ProductService, ReserveProduct,
};
pub use value_objects::Money;
