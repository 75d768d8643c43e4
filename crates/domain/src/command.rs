//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};
use serde::de::DeserializeOwned;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// How many times a command is re-run after losing an optimistic-concurrency race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The committed envelopes, ready to be published.
    pub envelopes: Vec<EventEnvelope>,

    /// The version of the aggregate after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Returns true if the command was accepted without producing events.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Trait for commands that target a single aggregate.
///
/// Commands are intentions. They may be rejected if the aggregate's current
/// state doesn't allow the action.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> &AggregateId;

    /// Returns the command name used in logs and metrics.
    fn command_type(&self) -> &'static str;
}

/// Loads an aggregate, runs a command against it and appends the resulting
/// events under optimistic concurrency.
///
/// A conflicting append means another writer got there first: the handler
/// reloads and re-validates, up to the configured [`RetryPolicy`].
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    retry: RetryPolicy,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate + DeserializeOwned,
{
    /// Creates a new command handler with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: S, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate has no events, returns a default instance.
    pub async fn load(&self, aggregate_id: &AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let Some(snapshot) = snapshot else {
            return self.replay(aggregate_id, A::default(), events);
        };

        match self.restore_from_snapshot(&snapshot) {
            Ok(aggregate) => self.replay(aggregate_id, aggregate, events),
            Err(error) => {
                tracing::warn!(
                    %aggregate_id,
                    snapshot_version = %snapshot.version,
                    %error,
                    "discarding unreadable snapshot, replaying full history"
                );
                let events = self.store.get_events_for_aggregate(aggregate_id).await?;
                self.replay(aggregate_id, A::default(), events)
            }
        }
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: &AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.exists().then_some(aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// `command_fn` receives the current aggregate state and returns either
    /// the events to append or a validation error. It may run more than once
    /// when the append loses a concurrency race.
    pub async fn execute<F>(
        &self,
        aggregate_id: &AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        for attempt in 1..=self.retry.max_attempts {
            let mut aggregate = self.load(aggregate_id).await?;
            let current_version = aggregate.version();

            let events = command_fn(&aggregate)?;

            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events,
                    envelopes: Vec::new(),
                    new_version: current_version,
                });
            }

            let envelopes = self.build_envelopes(aggregate_id, current_version, &events)?;

            let options = if current_version == Version::initial() {
                AppendOptions::expect_new()
            } else {
                AppendOptions::expect_version(current_version)
            };

            match self.store.append(envelopes.clone(), options).await {
                Ok(new_version) => {
                    aggregate.apply_events(events.iter().cloned());
                    aggregate.set_version(new_version);

                    return Ok(CommandResult {
                        aggregate,
                        events,
                        envelopes,
                        new_version,
                    });
                }
                Err(error) if error.is_conflict() => {
                    metrics::counter!(
                        "command_concurrency_retries_total",
                        "aggregate_type" => A::aggregate_type()
                    )
                    .increment(1);
                    tracing::debug!(%aggregate_id, attempt, %error, "append conflict, reloading");
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(DomainError::ConcurrencyRetriesExhausted {
            aggregate_id: aggregate_id.clone(),
            attempts: self.retry.max_attempts,
        })
    }

    fn replay(
        &self,
        aggregate_id: &AggregateId,
        mut aggregate: A,
        envelopes: Vec<EventEnvelope>,
    ) -> Result<A, DomainError> {
        for envelope in envelopes {
            let expected = aggregate.version().next();
            if envelope.version != expected {
                return Err(DomainError::CorruptHistory {
                    aggregate_id: aggregate_id.clone(),
                    expected,
                    found: envelope.version,
                });
            }

            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    fn build_envelopes(
        &self,
        aggregate_id: &AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id.clone())
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }

    fn restore_from_snapshot(&self, snapshot: &Snapshot) -> Result<A, serde_json::Error> {
        let mut aggregate: A = snapshot.restore()?;
        aggregate.set_version(snapshot.version);
        Ok(aggregate)
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Executes a command and saves a snapshot when the new version lands on
    /// the aggregate's snapshot interval.
    ///
    /// A failed snapshot write is logged and otherwise ignored.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: &AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self.execute(aggregate_id, command_fn).await?;

        if !result.is_noop() && result.aggregate.should_snapshot() {
            let saved = match Snapshot::from_state(
                aggregate_id.clone(),
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            ) {
                Ok(snapshot) => self.store.save_snapshot(snapshot).await,
                Err(error) => Err(error.into()),
            };

            match saved {
                Ok(()) => tracing::debug!(%aggregate_id, version = %result.new_version, "snapshot saved"),
                Err(error) => tracing::warn!(%aggregate_id, %error, "failed to save snapshot"),
            }
        }

        Ok(result)
    }
}
