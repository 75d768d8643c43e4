//! Bus error types.

use std::time::Duration;

use domain::DomainError;
use thiserror::Error;

/// Errors returned to whoever dispatched a command.
#[derive(Debug, Error)]
pub enum BusError {
    /// The target aggregate rejected or failed the command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// No answer arrived in time. The command may still complete.
    #[error("{command} did not complete within {timeout:?}")]
    Timeout {
        command: &'static str,
        timeout: Duration,
    },

    /// The executor's workers have shut down.
    #[error("{executor} executor is not accepting work")]
    Closed { executor: String },

    /// The worker dropped the command without answering.
    #[error("{command} was dropped before it produced a result")]
    Dropped { command: &'static str },
}

impl BusError {
    /// Returns true when the command was rejected by validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, BusError::Domain(e) if e.is_validation())
    }
}

/// Error type subscribers report back to the event bus.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
