use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use fieldflow_core::Actor;
use fieldflow_domain::WorkflowId;

use crate::dto::{
    RunWorkflowRequest, SaveWorkflowRequest, SetWorkflowActiveRequest, WorkflowResponse,
    WorkflowRunResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_workflows_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Vec<WorkflowResponse>>> {
    let workflows = state
        .workflow_service
        .list_workflows(&actor)
        .await?
        .into_iter()
        .map(WorkflowResponse::from)
        .collect();

    Ok(Json(workflows))
}

pub async fn create_workflow_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<SaveWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<WorkflowResponse>)> {
    let workflow = state
        .workflow_service
        .save_workflow(&actor, payload.into_input(None))
        .await?;

    Ok((StatusCode::CREATED, Json(WorkflowResponse::from(workflow))))
}

pub async fn get_workflow_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(workflow_id): Path<String>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow = state
        .workflow_service
        .find_workflow(&actor, WorkflowId::parse(workflow_id.as_str())?)
        .await?;

    Ok(Json(WorkflowResponse::from(workflow)))
}

pub async fn update_workflow_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(workflow_id): Path<String>,
    Json(payload): Json<SaveWorkflowRequest>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow_id = WorkflowId::parse(workflow_id.as_str())?;
    // Updates must target an existing definition of this tenant.
    state
        .workflow_service
        .find_workflow(&actor, workflow_id)
        .await?;

    let workflow = state
        .workflow_service
        .save_workflow(&actor, payload.into_input(Some(workflow_id)))
        .await?;

    Ok(Json(WorkflowResponse::from(workflow)))
}

pub async fn delete_workflow_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(workflow_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .workflow_service
        .delete_workflow(&actor, WorkflowId::parse(workflow_id.as_str())?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_workflow_active_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(workflow_id): Path<String>,
    Json(payload): Json<SetWorkflowActiveRequest>,
) -> ApiResult<Json<WorkflowResponse>> {
    let workflow = state
        .workflow_service
        .set_workflow_active(
            &actor,
            WorkflowId::parse(workflow_id.as_str())?,
            payload.is_active,
        )
        .await?;

    Ok(Json(WorkflowResponse::from(workflow)))
}

pub async fn run_workflow_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(workflow_id): Path<String>,
    Json(payload): Json<RunWorkflowRequest>,
) -> ApiResult<Json<WorkflowRunResponse>> {
    let run = state
        .workflow_service
        .run_workflow_now(
            &actor,
            WorkflowId::parse(workflow_id.as_str())?,
            payload.entity_id,
            payload.entity_snapshot,
        )
        .await?;

    Ok(Json(WorkflowRunResponse::from(run)))
}
