//! Payment query endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use event_store::EventStore;
use projections::PaymentView;

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /payments/{orderId}: the payment recorded for an order.
pub async fn get_by_order<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentView>, ApiError> {
    let order_id = parse_aggregate_id(&order_id)?;
    state
        .payments
        .find_by_order(&order_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No payment for order {order_id}")))
}
