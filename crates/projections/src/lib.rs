//! Read models for the query side.
//!
//! - [`Projection`] turns committed events into a read model
//! - [`ProjectionProcessor`] feeds projections live from the event bus and by
//!   replaying the store, and resets them by name
//! - Views: [`OrdersView`], [`ProductsView`], [`PaymentsView`]

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{AppliedVersions, Projection, ProjectionPosition};
pub use views::{OrderView, OrdersView, PaymentView, PaymentsView, ProductView, ProductsView};
