//! Saga state machine.

use serde::{Deserialize, Serialize};

/// Where an order fulfillment saga is in its lifecycle.
///
/// ```text
/// AwaitingReservation ──► AwaitingPayment ──► Approved
///          │                     │
///          └─────────────────────┴──────────► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    /// `ReserveProduct` was issued for the new order.
    #[default]
    AwaitingReservation,

    /// Stock is held; the saga waits for payment or compensation.
    AwaitingPayment,

    /// The order was approved (terminal).
    Approved,

    /// The order was rejected (terminal).
    Rejected,
}

impl SagaState {
    /// Returns true once the saga has seen its terminal fact.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Approved | SagaState::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::AwaitingReservation => "AWAITING_RESERVATION",
            SagaState::AwaitingPayment => "AWAITING_PAYMENT",
            SagaState::Approved => "APPROVED",
            SagaState::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
