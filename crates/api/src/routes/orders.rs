//! Order placement and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::AggregateId;
use domain::CreateOrder;
use event_store::EventStore;
use messaging::CommandGateway;
use projections::OrderView;
use saga::OrderSummary;
use serde::Deserialize;

use super::{parse_aggregate_id, require_non_blank, require_quantity};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: String,
    pub quantity: u32,
    pub address_id: String,
    /// Defaults to the configured user.
    pub user_id: Option<String>,
}

/// POST /orders: place an order and wait for the fulfillment outcome.
///
/// Answers with the order's [`OrderSummary`] once the saga has approved or
/// rejected it, or 504 when that takes longer than the configured response
/// timeout. The saga keeps running either way.
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id, quantity = req.quantity))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<OrderSummary>, ApiError> {
    require_quantity(req.quantity)?;
    require_non_blank("productId", &req.product_id)?;
    require_non_blank("addressId", &req.address_id)?;

    let user_id = req
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| state.config.default_user_id.clone());

    let order_id = AggregateId::new();
    let notifier = state.orchestrator.notifier();

    // Subscribe first so a fast saga cannot finish unobserved.
    let outcome = notifier.subscribe(&order_id);

    let command = CreateOrder::new(
        order_id.clone(),
        req.product_id.as_str(),
        user_id,
        req.quantity,
        req.address_id,
    );
    if let Err(error) = state.commands.dispatch(command.into()).await {
        notifier.unsubscribe(&order_id);
        return Err(error.into());
    }

    let timeout = state.config.order_response_timeout;
    match tokio::time::timeout(timeout, outcome).await {
        Ok(Ok(summary)) => Ok(Json(summary)),
        Ok(Err(_)) => Err(ApiError::Internal(format!(
            "Completion of order {order_id} was never reported"
        ))),
        Err(_) => {
            notifier.unsubscribe(&order_id);
            tracing::warn!(%order_id, ?timeout, "order outcome not available in time");
            Err(ApiError::Timeout(format!(
                "Order {order_id} did not complete within {timeout:?}"
            )))
        }
    }
}

/// GET /orders/{id}: the order as currently projected.
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    state
        .orders
        .get(&order_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))
}

/// GET /orders: every projected order.
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<OrderView>> {
    Json(state.orders.all().await)
}
