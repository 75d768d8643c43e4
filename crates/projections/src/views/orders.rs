//! Orders read model: one row per order with its current status.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Aggregate, Order, OrderEvent, OrderStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{AppliedVersions, Projection, ProjectionPosition};

/// An order as the query side sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: AggregateId,
    pub product_id: AggregateId,
    pub user_id: String,
    pub quantity: u32,
    pub address_id: String,
    pub order_status: OrderStatus,

    /// Rejection reason, once rejected.
    pub reason: Option<String>,
}

#[derive(Default)]
struct OrdersState {
    orders: HashMap<AggregateId, OrderView>,
    applied: AppliedVersions,
    position: ProjectionPosition,
}

/// Orders by id.
#[derive(Clone, Default)]
pub struct OrdersView {
    state: Arc<RwLock<OrdersState>>,
}

impl OrdersView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: &AggregateId) -> Option<OrderView> {
        self.state.read().await.orders.get(order_id).cloned()
    }

    /// All orders, ordered by id.
    pub async fn all(&self) -> Vec<OrderView> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.order_id.as_str().cmp(b.order_id.as_str()));
        orders
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.orders.is_empty()
    }
}

#[async_trait]
impl Projection for OrdersView {
    fn name(&self) -> &'static str {
        "orders"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Order::aggregate_type() {
            return Ok(());
        }
        let order_event: OrderEvent = event.decode()?;

        let mut state = self.state.write().await;
        if !state.applied.first_delivery(event) {
            return Ok(());
        }

        match order_event {
            OrderEvent::OrderCreated(data) => {
                state.orders.insert(
                    data.order_id.clone(),
                    OrderView {
                        order_id: data.order_id,
                        product_id: data.product_id,
                        user_id: data.user_id,
                        quantity: data.quantity,
                        address_id: data.address_id,
                        order_status: OrderStatus::Created,
                        reason: None,
                    },
                );
            }
            OrderEvent::OrderApproved(data) => {
                if let Some(order) = state.orders.get_mut(&data.order_id) {
                    order.order_status = OrderStatus::Approved;
                }
            }
            OrderEvent::OrderRejected(data) => {
                if let Some(order) = state.orders.get_mut(&data.order_id) {
                    order.order_status = OrderStatus::Rejected;
                    order.reason = Some(data.reason);
                }
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
        state.orders.clear();
        state.applied.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}
