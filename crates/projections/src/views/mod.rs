//! Read model views.

pub mod orders;
pub mod payments;
pub mod products;

pub use orders::{OrderView, OrdersView};
pub use payments::{PaymentView, PaymentsView};
pub use products::{ProductView, ProductsView};
