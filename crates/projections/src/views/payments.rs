//! Payments read model.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Aggregate, Payment, PaymentEvent};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{AppliedVersions, Projection, ProjectionPosition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
}

#[derive(Default)]
struct PaymentsState {
    payments: HashMap<AggregateId, PaymentView>,
    by_order: HashMap<AggregateId, AggregateId>,
    applied: AppliedVersions,
    position: ProjectionPosition,
}

/// Payments by id and by order.
#[derive(Clone, Default)]
pub struct PaymentsView {
    state: Arc<RwLock<PaymentsState>>,
}

impl PaymentsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, payment_id: &AggregateId) -> Option<PaymentView> {
        self.state.read().await.payments.get(payment_id).cloned()
    }

    pub async fn find_by_order(&self, order_id: &AggregateId) -> Option<PaymentView> {
        let state = self.state.read().await;
        state
            .by_order
            .get(order_id)
            .and_then(|payment_id| state.payments.get(payment_id))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.payments.len()
    }
}

#[async_trait]
impl Projection for PaymentsView {
    fn name(&self) -> &'static str {
        "payments"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Payment::aggregate_type() {
            return Ok(());
        }
        let payment_event: PaymentEvent = event.decode()?;

        let mut state = self.state.write().await;
        if !state.applied.first_delivery(event) {
            return Ok(());
        }

        match payment_event {
            PaymentEvent::PaymentProcessed(data) => {
                state
                    .by_order
                    .insert(data.order_id.clone(), data.payment_id.clone());
                state.payments.insert(
                    data.payment_id.clone(),
                    PaymentView {
                        payment_id: data.payment_id,
                        order_id: data.order_id,
                    },
                );
            }
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.payments.clear();
        state.by_order.clear();
        state.applied.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}
