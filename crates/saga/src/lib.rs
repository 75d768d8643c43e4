//! Order fulfillment saga.
//!
//! The saga coordinates the Order, Product and Payment aggregates through
//! commands:
//! 1. Reserve stock for the new order
//! 2. Look up the user's payment details and process the payment, bounded
//!    by a payment deadline
//! 3. Approve the order
//!
//! If a step after the reservation fails, the reservation is released before
//! the order is rejected.

pub mod deadline;
pub mod error;
pub mod instance;
pub mod notifier;
pub mod orchestrator;
pub mod order_fulfillment;
pub mod services;
pub mod state;
pub mod store;

pub use deadline::{DeadlineScheduler, DeadlineToken, FiredDeadline, InMemoryDeadlineScheduler};
pub use error::{Result, SagaError};
pub use instance::OrderSaga;
pub use notifier::{CompletionNotifier, OrderSummary};
pub use orchestrator::{
    SagaConfig, SagaContext, SagaDeadline, SagaEvent, SagaInput, SagaOrchestrator,
};
pub use services::{InMemoryUserDirectory, PaymentDetailsLookup, User, UserLookupError};
pub use state::SagaState;
pub use store::{InMemorySagaStore, SagaStore};
