//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

use crate::order::OrderError;
use crate::payment::PaymentError;
use crate::product::ProductError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An order command was rejected.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// A product command was rejected.
    #[error(transparent)]
    Product(#[from] ProductError),

    /// A payment command was rejected.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Every attempt lost the optimistic-concurrency race.
    #[error("Gave up on aggregate {aggregate_id} after {attempts} concurrent modification attempts")]
    ConcurrencyRetriesExhausted {
        aggregate_id: AggregateId,
        attempts: u32,
    },

    /// The stored history of an aggregate cannot be replayed.
    #[error(
        "Corrupt history for aggregate {aggregate_id}: expected version {expected}, found {found}"
    )]
    CorruptHistory {
        aggregate_id: AggregateId,
        expected: Version,
        found: Version,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true for command rejections that are reported to the caller
    /// and never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::Order(_) | DomainError::Product(_) | DomainError::Payment(_)
        )
    }

    /// Returns true for optimistic-concurrency failures on append.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }

    /// Returns true for failures that indicate broken data rather than a bad
    /// request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DomainError::CorruptHistory { .. } | DomainError::Serialization(_)
        )
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
