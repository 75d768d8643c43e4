//! Append-only, per-aggregate event log.
//!
//! The store is the single source of truth for aggregate state. Every
//! aggregate stream is ordered by a contiguous [`Version`] and guarded by
//! optimistic concurrency on append.

pub mod error;
pub mod event;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
