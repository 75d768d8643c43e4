//! Projection processor for feeding events to projections.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use messaging::{EventSubscriber, SubscriberError};
use tokio::sync::RwLock;

use crate::error::{ProjectionError, Result};
use crate::projection::{Projection, ProjectionPosition};

/// Delivers events to projections, live from the event bus and by replaying
/// the store.
///
/// - Catch-up: replays every stored event to all projections
/// - Live delivery: subscribed to the event bus
/// - Reset: clears one projection and replays the store into it
///
/// Live delivery waits while a replay is running, so a projection never sees
/// a live event before the history that precedes it.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
    replay_gate: RwLock<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            replay_gate: RwLock::new(()),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Names and positions of the registered projections.
    pub async fn positions(&self) -> Vec<(&'static str, ProjectionPosition)> {
        let mut positions = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            positions.push((projection.name(), projection.position().await));
        }
        positions
    }

    /// Replays all stored events into every projection. Events a projection
    /// already applied are skipped by the projection.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let _gate = self.replay_gate.write().await;
        self.replay(&self.projections).await
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        let _gate = self.replay_gate.read().await;
        for projection in &self.projections {
            projection.handle(event).await?;
            metrics::counter!("projections_events_processed", "projection" => projection.name())
                .increment(1);
        }
        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        let _gate = self.replay_gate.write().await;
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.replay(&self.projections).await
    }

    /// Resets the named projection and rebuilds it from the store.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self, name: &str) -> Result<()> {
        let projection = self
            .projections
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| ProjectionError::UnknownProjection(name.to_string()))?;

        let _gate = self.replay_gate.write().await;
        projection.reset().await?;
        self.replay(std::slice::from_ref(&projection)).await
    }

    async fn replay(&self, projections: &[Arc<dyn Projection>]) -> Result<()> {
        let mut stream = self.store.stream_all_events().await?;
        let mut replayed: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            replayed += 1;

            for projection in projections {
                projection.handle(&event).await?;
                metrics::counter!("projections_events_processed", "projection" => projection.name())
                    .increment(1);
            }
        }

        tracing::info!(
            events_replayed = replayed,
            projections = projections.len(),
            "replay complete"
        );
        Ok(())
    }
}

#[async_trait]
impl<S> EventSubscriber for ProjectionProcessor<S>
where
    S: EventStore + 'static,
{
    fn name(&self) -> &str {
        "projections"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), SubscriberError> {
        self.process_event(envelope).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::AppliedVersions;
    use common::AggregateId;
    use event_store::{AppendOptions, InMemoryEventStore, Version};

    /// Counts the events it applies.
    #[derive(Default)]
    struct CountingProjection {
        state: RwLock<(u64, AppliedVersions, ProjectionPosition)>,
    }

    impl CountingProjection {
        async fn count(&self) -> u64 {
            self.state.read().await.0
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, event: &EventEnvelope) -> Result<()> {
            let mut state = self.state.write().await;
            if state.1.first_delivery(event) {
                state.0 += 1;
                state.2 = state.2.advance();
            }
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            self.state.read().await.2
        }

        async fn reset(&self) -> Result<()> {
            *self.state.write().await = Default::default();
            Ok(())
        }
    }

    fn create_test_event(aggregate_id: &AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id.clone())
            .aggregate_type("Order")
            .event_type("TestEvent")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    async fn store_with_events(count: i64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        let agg_id = AggregateId::from("O-1");
        let events = (1..=count).map(|v| create_test_event(&agg_id, v)).collect();
        store.append(events, AppendOptions::new()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_catch_up_processes_all_events() {
        let projection = Arc::new(CountingProjection::default());
        let mut processor = ProjectionProcessor::new(store_with_events(3).await);
        processor.register(projection.clone());

        processor.run_catch_up().await.unwrap();

        assert_eq!(projection.count().await, 3);
    }

    #[tokio::test]
    async fn test_catch_up_twice_applies_once() {
        let projection = Arc::new(CountingProjection::default());
        let mut processor = ProjectionProcessor::new(store_with_events(3).await);
        processor.register(projection.clone());

        processor.run_catch_up().await.unwrap();
        processor.run_catch_up().await.unwrap();

        assert_eq!(projection.count().await, 3);
    }

    #[tokio::test]
    async fn test_live_event_then_catch_up() {
        let store = store_with_events(2).await;
        let projection = Arc::new(CountingProjection::default());
        let mut processor = ProjectionProcessor::new(store);
        processor.register(projection.clone());

        processor
            .process_event(&create_test_event(&AggregateId::from("O-2"), 1))
            .await
            .unwrap();
        processor.run_catch_up().await.unwrap();

        assert_eq!(projection.count().await, 3);
    }

    #[tokio::test]
    async fn test_reset_by_name_rebuilds_only_that_projection() {
        let counting = Arc::new(CountingProjection::default());
        let mut processor = ProjectionProcessor::new(store_with_events(2).await);
        processor.register(counting.clone());
        processor.run_catch_up().await.unwrap();

        processor.reset("counting").await.unwrap();
        assert_eq!(counting.count().await, 2);

        let err = processor.reset("missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "The event processor with name [missing] is not exists"
        );
    }

    #[tokio::test]
    async fn test_rebuild_resets_and_replays() {
        let projection = Arc::new(CountingProjection::default());
        let mut processor = ProjectionProcessor::new(store_with_events(2).await);
        processor.register(projection.clone());

        processor.run_catch_up().await.unwrap();
        processor.rebuild_all().await.unwrap();

        assert_eq!(projection.count().await, 2);
        let positions = processor.positions().await;
        assert_eq!(positions, vec![("counting", ProjectionPosition { events_processed: 2 })]);
    }

    #[tokio::test]
    async fn test_subscriber_delivery() {
        let projection = Arc::new(CountingProjection::default());
        let mut processor = ProjectionProcessor::new(InMemoryEventStore::new());
        processor.register(projection.clone());

        EventSubscriber::handle(&processor, &create_test_event(&AggregateId::from("O-1"), 1))
            .await
            .unwrap();

        assert_eq!(projection.count().await, 1);
    }
}
