//! Saga instance state.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::deadline::DeadlineToken;
use crate::state::SagaState;

/// One order fulfillment saga.
///
/// Holds only orchestration state. Everything the saga acts with (the
/// command gateway, the scheduler, the lookup) is handed to it per input, so
/// an instance serializes as plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSaga {
    order_id: AggregateId,
    state: SagaState,

    /// Cancellation token of the outstanding payment deadline.
    deadline: Option<DeadlineToken>,

    payment_processed: bool,

    /// Set once the reservation release has been issued.
    compensation_reason: Option<String>,

    /// Tokens of commands waiting to be issued again.
    #[serde(default)]
    retries: Vec<DeadlineToken>,

    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl OrderSaga {
    /// Starts a saga for a newly created order.
    pub fn start(order_id: AggregateId) -> Self {
        Self {
            order_id,
            state: SagaState::AwaitingReservation,
            deadline: None,
            payment_processed: false,
            compensation_reason: None,
            retries: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn order_id(&self) -> &AggregateId {
        &self.order_id
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn deadline(&self) -> Option<&DeadlineToken> {
        self.deadline.as_ref()
    }

    pub fn payment_processed(&self) -> bool {
        self.payment_processed
    }

    pub fn compensation_reason(&self) -> Option<&str> {
        self.compensation_reason.as_deref()
    }

    pub fn is_compensating(&self) -> bool {
        self.compensation_reason.is_some()
    }

    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Returns true once the saga has ended. An ended saga ignores every
    /// further input.
    pub fn is_ended(&self) -> bool {
        self.state.is_terminal()
    }

    pub(crate) fn reservation_confirmed(&mut self) {
        self.state = SagaState::AwaitingPayment;
    }

    pub(crate) fn set_deadline(&mut self, token: DeadlineToken) {
        self.deadline = Some(token);
    }

    /// Clears and returns the outstanding deadline token.
    pub(crate) fn take_deadline(&mut self) -> Option<DeadlineToken> {
        self.deadline.take()
    }

    pub(crate) fn mark_payment_processed(&mut self) {
        self.payment_processed = true;
    }

    pub(crate) fn begin_compensation(&mut self, reason: &str) {
        self.compensation_reason = Some(reason.to_string());
    }

    pub(crate) fn add_retry(&mut self, token: DeadlineToken) {
        self.retries.push(token);
    }

    /// Removes a retry token, returning false if it is not outstanding.
    pub(crate) fn take_retry(&mut self, token: &DeadlineToken) -> bool {
        let before = self.retries.len();
        self.retries.retain(|t| t != token);
        self.retries.len() != before
    }

    pub(crate) fn take_retries(&mut self) -> Vec<DeadlineToken> {
        std::mem::take(&mut self.retries)
    }

    pub(crate) fn end(&mut self, state: SagaState) {
        self.state = state;
        self.deadline = None;
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_awaits_reservation() {
        let saga = OrderSaga::start(AggregateId::from("O-1"));

        assert_eq!(saga.order_id().as_str(), "O-1");
        assert_eq!(saga.state(), SagaState::AwaitingReservation);
        assert!(saga.deadline().is_none());
        assert!(!saga.is_compensating());
        assert!(!saga.is_ended());
    }

    #[test]
    fn take_deadline_clears_token() {
        let mut saga = OrderSaga::start(AggregateId::from("O-1"));
        let token = DeadlineToken::new();
        saga.set_deadline(token.clone());

        assert_eq!(saga.take_deadline(), Some(token));
        assert!(saga.take_deadline().is_none());
    }

    #[test]
    fn retry_tokens_are_taken_once() {
        let mut saga = OrderSaga::start(AggregateId::from("O-1"));
        let first = DeadlineToken::new();
        let second = DeadlineToken::new();
        saga.add_retry(first.clone());
        saga.add_retry(second.clone());

        assert!(saga.take_retry(&first));
        assert!(!saga.take_retry(&first));
        assert_eq!(saga.pending_retries(), 1);
        assert_eq!(saga.take_retries(), vec![second]);
        assert_eq!(saga.pending_retries(), 0);
    }

    #[test]
    fn instances_without_retries_still_deserialize() {
        let saga = OrderSaga::start(AggregateId::from("O-1"));
        let mut json = serde_json::to_value(&saga).unwrap();
        json.as_object_mut().unwrap().remove("retries");

        let restored: OrderSaga = serde_json::from_value(json).unwrap();
        assert_eq!(restored.pending_retries(), 0);
    }

    #[test]
    fn instance_round_trips_through_json() {
        let mut saga = OrderSaga::start(AggregateId::from("O-1"));
        saga.reservation_confirmed();
        saga.set_deadline(DeadlineToken::new());
        saga.begin_compensation("Payment timeout");

        let json = serde_json::to_value(&saga).unwrap();
        assert_eq!(json["state"], "AWAITING_PAYMENT");
        assert_eq!(json["compensation_reason"], "Payment timeout");

        let restored: OrderSaga = serde_json::from_value(json).unwrap();
        assert_eq!(restored, saga);
    }

    #[test]
    fn end_drops_deadline() {
        let mut saga = OrderSaga::start(AggregateId::from("O-1"));
        saga.set_deadline(DeadlineToken::new());
        saga.end(SagaState::Rejected);

        assert!(saga.is_ended());
        assert!(saga.deadline().is_none());
        assert!(saga.ended_at().is_some());
    }
}
