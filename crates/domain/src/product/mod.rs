//! Product aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod lookup;
mod service;

pub use aggregate::Product;
pub use commands::{CancelProductReservation, CreateProduct, ReserveProduct};
pub use events::{
    ProductCreatedData, ProductEvent, ProductReservationCancelledData, ProductReservedData,
};
pub use lookup::{InMemoryProductLookup, ProductLookup, ProductLookupEntry};
pub use service::ProductService;

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during product operations.
#[derive(Debug, Error)]
pub enum ProductError {
    /// No product with this ID has been created.
    #[error("Product {product_id} does not exist")]
    NotFound { product_id: AggregateId },

    /// The aggregate already holds a created product.
    #[error("Product {product_id} already exists")]
    AlreadyCreated { product_id: AggregateId },

    /// The uniqueness lookup found a product with the same ID or title.
    #[error("Product with productId {product_id} or title {title} already exist")]
    AlreadyExists {
        product_id: AggregateId,
        title: String,
    },

    #[error("Title is required")]
    BlankTitle,

    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: i64 },

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Insufficient number of items in stock")]
    InsufficientStock { available: u32, requested: u32 },
}
