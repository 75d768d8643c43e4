//! Workflow completion notifications.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use common::AggregateId;
use domain::OrderStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};

/// Final outcome of an order's fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub order_status: OrderStatus,

    /// Empty when approved, the rejection reason otherwise.
    pub message: String,
}

const BROADCAST_CAPACITY: usize = 256;

struct Inner {
    waiters: Mutex<HashMap<AggregateId, Vec<oneshot::Sender<OrderSummary>>>>,
    all: broadcast::Sender<OrderSummary>,
}

/// Delivers each order's [`OrderSummary`] to whoever is waiting for it.
///
/// Subscribe before triggering the workflow; a summary published with nobody
/// waiting for that order only reaches [`subscribe_all`](Self::subscribe_all)
/// receivers.
#[derive(Clone)]
pub struct CompletionNotifier {
    inner: Arc<Inner>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        let (all, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                waiters: Mutex::new(HashMap::new()),
                all,
            }),
        }
    }

    /// Waits for the summary of one order.
    pub fn subscribe(&self, order_id: &AggregateId) -> oneshot::Receiver<OrderSummary> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(order_id.clone())
            .or_default()
            .push(tx);
        rx
    }

    /// Receives every summary published from now on.
    pub fn subscribe_all(&self) -> broadcast::Receiver<OrderSummary> {
        self.inner.all.subscribe()
    }

    /// Forgets the waiters of an order, e.g. after the caller gave up.
    pub fn unsubscribe(&self, order_id: &AggregateId) {
        self.inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(order_id);
    }

    pub(crate) fn notify(&self, summary: OrderSummary) {
        let waiters = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&summary.order_id)
            .unwrap_or_default();

        for waiter in waiters {
            let _ = waiter.send(summary.clone());
        }
        let _ = self.inner.all.send(summary);
    }
}

impl Default for CompletionNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(order_id: &str, status: OrderStatus) -> OrderSummary {
        OrderSummary {
            order_id: AggregateId::from(order_id),
            order_status: status,
            message: String::new(),
        }
    }

    #[tokio::test]
    async fn waiter_receives_its_orders_summary() {
        let notifier = CompletionNotifier::new();
        let rx = notifier.subscribe(&AggregateId::from("O-1"));
        let mut all = notifier.subscribe_all();

        notifier.notify(summary("O-2", OrderStatus::Rejected));
        notifier.notify(summary("O-1", OrderStatus::Approved));

        let received = rx.await.unwrap();
        assert_eq!(received.order_status, OrderStatus::Approved);
        assert_eq!(all.recv().await.unwrap().order_id.as_str(), "O-2");
        assert_eq!(all.recv().await.unwrap().order_id.as_str(), "O-1");
    }

    #[tokio::test]
    async fn unsubscribe_drops_the_waiter() {
        let notifier = CompletionNotifier::new();
        let rx = notifier.subscribe(&AggregateId::from("O-1"));

        notifier.unsubscribe(&AggregateId::from("O-1"));

        assert!(rx.await.is_err());
    }

    #[test]
    fn summary_uses_camel_case() {
        let json = serde_json::to_value(summary("O-1", OrderStatus::Approved)).unwrap();
        assert_eq!(json["orderId"], "O-1");
        assert_eq!(json["orderStatus"], "APPROVED");
        assert_eq!(json["message"], "");
    }
}
