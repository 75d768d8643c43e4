//! Read model maintenance.

use std::sync::Arc;

use axum::extract::{Path, State};
use event_store::EventStore;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /management/event-processor/{name}/reset: clear a read model and
/// rebuild it from the event store.
#[tracing::instrument(skip(state))]
pub async fn reset<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<String, ApiError> {
    state.projection_processor.reset(&name).await?;
    tracing::info!(projection = %name, "read model rebuilt");
    Ok(format!("The event processor with name [{name}] has been reset"))
}
