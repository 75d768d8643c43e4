//! Services the saga queries while it runs.

pub mod users;

pub use users::{InMemoryUserDirectory, PaymentDetailsLookup, User, UserLookupError};
