use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use fieldflow_core::{Actor, AppError};
use fieldflow_domain::WebhookId;

use crate::dto::{
    CreateWebhookRequest, DeliveryAttemptResponse, DeliveryListQueryRequest,
    DeliveryOutcomeResponse, RotateWebhookSecretRequest, WebhookResponse,
    WebhookWithSecretResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_webhooks_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Vec<WebhookResponse>>> {
    let webhooks = state
        .webhook_service
        .list_webhooks(&actor)
        .await?
        .into_iter()
        .map(WebhookResponse::from)
        .collect();

    Ok(Json(webhooks))
}

pub async fn create_webhook_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateWebhookRequest>,
) -> ApiResult<(StatusCode, Json<WebhookWithSecretResponse>)> {
    let webhook = state
        .webhook_service
        .create_webhook(&actor, payload.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(WebhookWithSecretResponse::from(webhook)),
    ))
}

pub async fn get_webhook_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(webhook_id): Path<String>,
) -> ApiResult<Json<WebhookResponse>> {
    let webhook = state
        .webhook_service
        .find_webhook(&actor, WebhookId::parse(webhook_id.as_str())?)
        .await?;

    Ok(Json(WebhookResponse::from(webhook)))
}

pub async fn delete_webhook_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(webhook_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .webhook_service
        .delete_webhook(&actor, WebhookId::parse(webhook_id.as_str())?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn pause_webhook_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(webhook_id): Path<String>,
) -> ApiResult<Json<WebhookResponse>> {
    let webhook = state
        .webhook_service
        .pause_webhook(&actor, WebhookId::parse(webhook_id.as_str())?)
        .await?;

    Ok(Json(WebhookResponse::from(webhook)))
}

pub async fn reactivate_webhook_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(webhook_id): Path<String>,
) -> ApiResult<Json<WebhookResponse>> {
    let webhook = state
        .webhook_service
        .reactivate_webhook(&actor, WebhookId::parse(webhook_id.as_str())?)
        .await?;

    Ok(Json(WebhookResponse::from(webhook)))
}

/// Accepts an empty body, which generates a new key.
pub async fn rotate_webhook_secret_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(webhook_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<WebhookWithSecretResponse>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RotateWebhookSecretRequest::default()
    } else {
        serde_json::from_slice::<RotateWebhookSecretRequest>(&body).map_err(|error| {
            AppError::Validation(format!("invalid rotate-secret payload: {error}"))
        })?
    };

    let rotated = state
        .webhook_service
        .rotate_webhook_secret(
            &actor,
            WebhookId::parse(webhook_id.as_str())?,
            request.secret,
        )
        .await?;

    Ok(Json(WebhookWithSecretResponse::from(rotated)))
}

pub async fn test_webhook_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(webhook_id): Path<String>,
) -> ApiResult<Json<DeliveryOutcomeResponse>> {
    let outcome = state
        .webhook_service
        .send_test_delivery(&actor, WebhookId::parse(webhook_id.as_str())?)
        .await?;

    Ok(Json(DeliveryOutcomeResponse::from(outcome)))
}

pub async fn list_webhook_deliveries_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(webhook_id): Path<String>,
    Query(query): Query<DeliveryListQueryRequest>,
) -> ApiResult<Json<Vec<DeliveryAttemptResponse>>> {
    let attempts = state
        .webhook_service
        .list_deliveries(&actor, WebhookId::parse(webhook_id.as_str())?, query.into())
        .await?
        .into_iter()
        .map(DeliveryAttemptResponse::from)
        .collect();

    Ok(Json(attempts))
}
