//! Fan-out of committed events to subscribers.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::error::SubscriberError;

/// Something that reacts to committed events.
///
/// Delivery is at-least-once, so handlers must tolerate seeing the same
/// envelope twice.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Handles one committed envelope.
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), SubscriberError>;
}

/// In-process event bus.
///
/// `publish` hands each envelope to every subscriber in subscription order
/// and waits for them. Envelopes from one call are delivered in the order
/// given, so a publisher that publishes in commit order keeps per-aggregate
/// ordering for every subscriber.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for every event published from now on.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        tracing::info!(subscriber = subscriber.name(), "event subscriber registered");
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers envelopes to all subscribers.
    ///
    /// A failing subscriber is logged and counted; it does not stop delivery
    /// to the others.
    pub async fn publish(&self, envelopes: &[EventEnvelope]) {
        if envelopes.is_empty() {
            return;
        }

        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for envelope in envelopes {
            for subscriber in &subscribers {
                if let Err(error) = subscriber.handle(envelope).await {
                    metrics::counter!(
                        "event_delivery_failures_total",
                        "subscriber" => subscriber.name().to_string()
                    )
                    .increment(1);
                    tracing::error!(
                        subscriber = subscriber.name(),
                        event_type = %envelope.event_type,
                        aggregate_id = %envelope.aggregate_id,
                        %error,
                        "subscriber failed to handle event"
                    );
                }
            }
            metrics::counter!("events_published_total", "event_type" => envelope.event_type.clone())
                .increment(1);
        }
    }
}
