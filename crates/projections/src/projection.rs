//! Core projection trait and position tracking.

use std::collections::HashMap;

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventEnvelope, Version};

use crate::Result;

/// Tracks how many events a projection has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Number of events applied by this projection.
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self {
            events_processed: 0,
        }
    }

    /// Advances the position by one event.
    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Highest version applied per aggregate.
///
/// Events reach a projection both live and through replay, and live delivery
/// is at-least-once. A view consults this before applying an envelope so
/// each event is applied once.
#[derive(Debug, Default)]
pub struct AppliedVersions {
    versions: HashMap<AggregateId, Version>,
}

impl AppliedVersions {
    /// Records the envelope and returns true if it has not been applied yet.
    pub fn first_delivery(&mut self, envelope: &EventEnvelope) -> bool {
        match self.versions.get(&envelope.aggregate_id) {
            Some(applied) if *applied >= envelope.version => false,
            _ => {
                self.versions
                    .insert(envelope.aggregate_id.clone(), envelope.version);
                true
            }
        }
    }

    pub fn clear(&mut self) {
        self.versions.clear();
    }
}

/// A projection that processes events and updates a read model.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Name the projection is addressed by, e.g. in a reset request.
    fn name(&self) -> &'static str;

    /// Handles a single event. Events the projection does not care about,
    /// and events it has already applied, are ignored.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model.
    async fn reset(&self) -> Result<()>;
}
