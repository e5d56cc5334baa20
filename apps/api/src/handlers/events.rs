use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use fieldflow_core::Actor;

use crate::dto::{EntityEventRequest, EventDispatchResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Feeds one entity change through trigger evaluation.
///
/// Inline mode executes immediate runs before responding; delayed and queued
/// runs are returned as `pending`.
pub async fn ingest_entity_event_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<EntityEventRequest>,
) -> ApiResult<(StatusCode, Json<EventDispatchResponse>)> {
    let summary = state
        .workflow_service
        .on_entity_event(payload.into_event(actor.tenant_id()))
        .await?;

    Ok((StatusCode::ACCEPTED, Json(EventDispatchResponse::from(summary))))
}
