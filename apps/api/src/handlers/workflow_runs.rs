use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use fieldflow_core::Actor;
use fieldflow_domain::WorkflowRunId;

use crate::dto::{WorkflowRunListQueryRequest, WorkflowRunResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_workflow_runs_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<WorkflowRunListQueryRequest>,
) -> ApiResult<Json<Vec<WorkflowRunResponse>>> {
    let runs = state
        .workflow_service
        .list_runs(&actor, query.try_into()?)
        .await?
        .into_iter()
        .map(WorkflowRunResponse::from)
        .collect();

    Ok(Json(runs))
}

pub async fn get_workflow_run_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<WorkflowRunResponse>> {
    let run = state
        .workflow_service
        .find_run(&actor, WorkflowRunId::parse(run_id.as_str())?)
        .await?;

    Ok(Json(WorkflowRunResponse::from(run)))
}
