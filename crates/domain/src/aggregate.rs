//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are facts that have already happened. They are immutable
/// and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name stored on the envelope.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate's state is a left fold of its committed events. Commands are
/// validated against that state and answered with new events; nothing else
/// mutates it.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of validation errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, or None before its creation event.
    fn id(&self) -> Option<&AggregateId>;

    /// Returns the version of the last applied event (0 for a new aggregate).
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the command handler while replaying envelopes.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// Must be pure and deterministic, and must not fail: the event has
    /// already happened. Anything that can be rejected is rejected by the
    /// command method that produced the event.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Returns true once the creation event has been applied.
    fn exists(&self) -> bool {
        self.id().is_some()
    }
}

/// Trait for aggregates that support snapshotting.
///
/// Snapshots only shorten replay. Loading from a snapshot must give the same
/// state as replaying every event.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Returns the snapshot interval (number of events between snapshots).
    fn snapshot_interval() -> usize {
        100
    }

    /// Returns whether a snapshot should be taken at the current version.
    fn should_snapshot(&self) -> bool {
        let version = self.version().as_i64();
        version > 0 && (version as usize).is_multiple_of(Self::snapshot_interval())
    }
}
