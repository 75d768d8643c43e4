//! Saga error types.

use common::AggregateId;
use messaging::BusError;
use thiserror::Error;

/// Errors that can occur while driving a saga.
///
/// Downstream outages never surface here; the orchestrator turns them into
/// compensation or retries. What remains is what it could not recover from.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A command the saga issued could not be dispatched.
    #[error("Dispatch of {command} failed: {source}")]
    Dispatch {
        command: &'static str,
        #[source]
        source: BusError,
    },

    /// The saga's own work queue is closed.
    #[error("Saga queue for order {order_id} is closed")]
    QueueClosed { order_id: AggregateId },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
