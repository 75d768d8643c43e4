use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Inner {
    /// Every committed event in commit order.
    log: Vec<EventEnvelope>,
    /// Per-aggregate indices into `log`, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

impl Inner {
    fn current_version(&self, aggregate_id: &AggregateId) -> Version {
        self.streams
            .get(aggregate_id)
            .and_then(|idx| idx.last())
            .map(|&i| self.log[i].version)
            .unwrap_or_else(Version::initial)
    }

    fn stream(&self, aggregate_id: &AggregateId) -> impl Iterator<Item = &EventEnvelope> {
        self.streams
            .get(aggregate_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.log[i])
    }
}

/// In-memory event store.
///
/// Cloning shares the underlying log. Appends for all aggregates go through a
/// single write lock, which is held only for the version check and the push.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id.clone();
        let first_new_version = events[0].version;

        let mut inner = self.inner.write().await;
        let current_version = inner.current_version(&aggregate_id);

        if let Some(expected) = options.expected_version {
            if current_version != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual: current_version,
                });
            }
        }

        if first_new_version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: Version::new(first_new_version.as_i64() - 1),
                actual: current_version,
            });
        }

        let mut last_version = current_version;
        for event in events {
            last_version = event.version;
            let position = inner.log.len();
            inner.log.push(event);
            inner
                .streams
                .entry(aggregate_id.clone())
                .or_default()
                .push(position);
        }

        metrics::counter!("event_store_appends_total").increment(1);
        tracing::trace!(%aggregate_id, version = %last_version, "events appended");

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner.stream(aggregate_id).cloned().collect())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: &AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .stream(aggregate_id)
            .filter(|e| e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.inner.read().await.log.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        let version = inner.current_version(aggregate_id);
        Ok((version != Version::initial()).then_some(version))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .snapshots
            .insert(snapshot.aggregate_id.clone(), snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: &AggregateId) -> Result<Option<Snapshot>> {
        let inner = self.inner.read().await;
        Ok(inner.snapshots.get(aggregate_id).cloned())
    }
}
