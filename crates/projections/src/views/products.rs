//! Products read model: the catalogue with stock kept current.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Aggregate, Money, Product, ProductEvent};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{AppliedVersions, Projection, ProjectionPosition};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub product_id: AggregateId,
    pub title: String,
    pub price: Money,

    /// Units in stock, net of outstanding reservations.
    pub quantity: u32,
}

#[derive(Default)]
struct ProductsState {
    products: HashMap<AggregateId, ProductView>,
    applied: AppliedVersions,
    position: ProjectionPosition,
}

/// Products by id.
#[derive(Clone, Default)]
pub struct ProductsView {
    state: Arc<RwLock<ProductsState>>,
}

impl ProductsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, product_id: &AggregateId) -> Option<ProductView> {
        self.state.read().await.products.get(product_id).cloned()
    }

    /// All products, ordered by title.
    pub async fn all(&self) -> Vec<ProductView> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.title.cmp(&b.title));
        products
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.products.len()
    }
}

#[async_trait]
impl Projection for ProductsView {
    fn name(&self) -> &'static str {
        "products"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Product::aggregate_type() {
            return Ok(());
        }
        let product_event: ProductEvent = event.decode()?;

        let mut state = self.state.write().await;
        if !state.applied.first_delivery(event) {
            return Ok(());
        }

        match product_event {
            ProductEvent::ProductCreated(data) => {
                state.products.insert(
                    data.product_id.clone(),
                    ProductView {
                        product_id: data.product_id,
                        title: data.title,
                        price: data.price,
                        quantity: data.quantity,
                    },
                );
            }
            ProductEvent::ProductReserved(data) => {
                if let Some(product) = state.products.get_mut(&data.product_id) {
                    product.quantity = product.quantity.saturating_sub(data.quantity);
                }
            }
            ProductEvent::ProductReservationCancelled(data) => {
                if let Some(product) = state.products.get_mut(&data.product_id) {
                    product.quantity += data.quantity;
                }
            }
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.clear();
        state.applied.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}
