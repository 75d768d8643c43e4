//! Key-partitioned executor.
//!
//! Work items for the same key always land on the same worker and run one
//! after another in submission order. Different keys may run concurrently.

use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;

use common::AggregateId;
use tokio::sync::mpsc;

use crate::error::BusError;

/// A unit of work run to completion by one partition worker.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Fixed pool of workers, each draining its own unbounded queue.
#[derive(Clone)]
pub struct PartitionedExecutor {
    name: Arc<str>,
    workers: Arc<[mpsc::UnboundedSender<Job>]>,
}

impl PartitionedExecutor {
    /// Spawns `partitions` workers on the current tokio runtime.
    ///
    /// Workers stop once every clone of the executor has been dropped and
    /// their queues are drained.
    pub fn new(name: impl Into<String>, partitions: usize) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let workers: Vec<_> = (0..partitions.max(1))
            .map(|index| {
                let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
                let worker_name = Arc::clone(&name);
                tokio::spawn(async move {
                    while let Some(job) = rx.recv().await {
                        job.await;
                    }
                    tracing::debug!(executor = %worker_name, partition = index, "worker stopped");
                });
                tx
            })
            .collect();

        Self {
            name,
            workers: workers.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partitions(&self) -> usize {
        self.workers.len()
    }

    /// Returns the partition a key is routed to.
    pub fn partition_for(&self, key: &AggregateId) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.workers.len() as u64) as usize
    }

    /// Queues a job behind every job previously submitted for the same key.
    pub fn submit<F>(&self, key: &AggregateId, job: F) -> Result<(), BusError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let partition = self.partition_for(key);
        self.workers[partition]
            .send(Box::pin(job))
            .map_err(|_| BusError::Closed {
                executor: self.name.to_string(),
            })
    }
}
