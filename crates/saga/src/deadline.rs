//! Deadline scheduling.
//!
//! A deadline is a named, delayed delivery of a payload back to whoever
//! scheduled it. Pending deadlines live in memory only and are lost when the
//! process stops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Opaque handle used to cancel a scheduled deadline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeadlineToken(String);

impl DeadlineToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeadlineToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeadlineToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A deadline that ran out, carrying the payload it was scheduled with.
#[derive(Debug, Clone)]
pub struct FiredDeadline<P> {
    pub token: DeadlineToken,
    pub name: String,
    pub payload: P,
}

/// Schedules and cancels deadlines.
///
/// Each token fires at most once. A cancel that completes before the fire
/// wins; once a deadline has fired, cancelling it is a no-op.
pub trait DeadlineScheduler<P>: Send + Sync {
    /// Schedules `payload` to be delivered back after `delay`. Never blocks.
    fn schedule(&self, delay: Duration, name: &str, payload: P) -> DeadlineToken;

    /// Cancels a pending deadline. Returns false if it already fired, was
    /// already cancelled or was scheduled under another name.
    fn cancel(&self, token: &DeadlineToken, name: &str) -> bool;
}

struct Pending {
    name: String,
    timer: AbortHandle,
}

type PendingMap = Arc<Mutex<HashMap<DeadlineToken, Pending>>>;

/// Tokio timer backed scheduler.
///
/// Fired deadlines are delivered on the receiver returned by [`new`].
///
/// [`new`]: InMemoryDeadlineScheduler::new
pub struct InMemoryDeadlineScheduler<P> {
    pending: PendingMap,
    fired: mpsc::UnboundedSender<FiredDeadline<P>>,
}

impl<P: Send + 'static> InMemoryDeadlineScheduler<P> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredDeadline<P>>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            fired,
        };
        (scheduler, rx)
    }

    /// Number of deadlines that have neither fired nor been cancelled.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<P: Send + 'static> DeadlineScheduler<P> for InMemoryDeadlineScheduler<P> {
    fn schedule(&self, delay: Duration, name: &str, payload: P) -> DeadlineToken {
        let token = DeadlineToken::new();

        // The timer cannot claim its entry until it has been inserted.
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        let timer = tokio::spawn({
            let pending = Arc::clone(&self.pending);
            let fired = self.fired.clone();
            let token = token.clone();
            let name = name.to_string();
            async move {
                tokio::time::sleep(delay).await;

                let claimed = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&token)
                    .is_some();
                if !claimed {
                    return;
                }

                metrics::counter!("deadlines_fired_total", "name" => name.clone()).increment(1);
                tracing::debug!(%token, deadline = %name, "deadline fired");
                if fired
                    .send(FiredDeadline {
                        token,
                        name,
                        payload,
                    })
                    .is_err()
                {
                    tracing::warn!("deadline receiver dropped");
                }
            }
        });

        pending.insert(
            token.clone(),
            Pending {
                name: name.to_string(),
                timer: timer.abort_handle(),
            },
        );

        metrics::counter!("deadlines_scheduled_total", "name" => name.to_string()).increment(1);
        tracing::debug!(%token, deadline = name, ?delay, "deadline scheduled");
        token
    }

    fn cancel(&self, token: &DeadlineToken, name: &str) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        match pending.get(token) {
            Some(entry) if entry.name == name => {}
            _ => return false,
        }

        if let Some(entry) = pending.remove(token) {
            entry.timer.abort();
        }

        metrics::counter!("deadlines_cancelled_total", "name" => name.to_string()).increment(1);
        tracing::debug!(%token, deadline = name, "deadline cancelled");
        true
    }
}
