//! Liveness and Prometheus endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub subscribers: usize,
    pub projections: usize,
    /// Sagas still waiting on reservation or payment. Absent when the saga
    /// store could not be read.
    pub active_sagas: Option<usize>,
}

/// GET /health: liveness check with a short summary of in-flight work.
pub async fn health<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let active_sagas = match state.orchestrator.store().active().await {
        Ok(sagas) => Some(sagas.len()),
        Err(error) => {
            tracing::warn!(%error, "saga store unreadable");
            None
        }
    };

    let status = if active_sagas.is_some() { "ok" } else { "degraded" };
    let code = if active_sagas.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            subscribers: state.commands.event_bus().subscriber_count(),
            projections: state.projection_processor.projection_count(),
            active_sagas,
        }),
    )
}

/// GET /metrics: Prometheus text exposition.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
