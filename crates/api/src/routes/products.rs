//! Product catalogue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::AggregateId;
use domain::{CreateProduct, Money};
use event_store::EventStore;
use messaging::CommandGateway;
use projections::ProductView;
use serde::{Deserialize, Serialize};

use super::{require_non_blank, require_quantity};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    /// Generated when omitted.
    pub product_id: Option<String>,
    pub title: String,
    /// Price in cents.
    pub price: i64,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreatedResponse {
    pub product_id: AggregateId,
}

/// POST /products: add a product to the catalogue.
#[tracing::instrument(skip(state, req), fields(title = %req.title))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductCreatedResponse>), ApiError> {
    require_non_blank("title", &req.title)?;
    if req.price < 1 {
        return Err(ApiError::BadRequest(format!(
            "price must be at least 1, got {}",
            req.price
        )));
    }
    require_quantity(req.quantity)?;

    let product_id = match req.product_id.as_deref() {
        Some(id) if !id.trim().is_empty() => AggregateId::from(id),
        _ => AggregateId::new(),
    };

    let command = CreateProduct::new(
        product_id,
        req.title,
        Money::from_cents(req.price),
        req.quantity,
    );
    let response = state.commands.dispatch(command.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductCreatedResponse {
            product_id: response.aggregate_id,
        }),
    ))
}

/// GET /products: list the catalogue with current stock.
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<ProductView>> {
    Json(state.products.all().await)
}
