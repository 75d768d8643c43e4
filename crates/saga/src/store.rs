//! Saga instance persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::instance::OrderSaga;

/// Stores saga instances keyed by order.
///
/// Ended instances are kept so that a redelivered fact for a finished order
/// finds a tombstone instead of starting over.
#[async_trait]
pub trait SagaStore: Send + Sync {
    async fn load(&self, order_id: &AggregateId) -> Result<Option<OrderSaga>>;

    async fn save(&self, saga: &OrderSaga) -> Result<()>;

    /// Returns every instance that has not ended.
    async fn active(&self) -> Result<Vec<OrderSaga>>;
}

/// In-memory saga store. Instances are held in their JSON form.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    instances: Arc<RwLock<HashMap<AggregateId, serde_json::Value>>>,
}

impl InMemorySagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn load(&self, order_id: &AggregateId) -> Result<Option<OrderSaga>> {
        let instances = self.instances.read().await;
        match instances.get(order_id) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn save(&self, saga: &OrderSaga) -> Result<()> {
        let value = serde_json::to_value(saga)?;
        self.instances
            .write()
            .await
            .insert(saga.order_id().clone(), value);
        Ok(())
    }

    async fn active(&self) -> Result<Vec<OrderSaga>> {
        let instances = self.instances.read().await;
        let mut active = Vec::new();
        for value in instances.values() {
            let saga: OrderSaga = serde_json::from_value(value.clone())?;
            if !saga.is_ended() {
                active.push(saga);
            }
        }
        Ok(active)
    }
}
