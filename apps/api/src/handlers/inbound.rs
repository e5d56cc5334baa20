use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use fieldflow_core::AppError;
use tracing::{info, warn};

use crate::dto::InboundReceivedResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";

/// Payment provider callback. The raw body is verified before anything is parsed.
pub async fn payment_callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<InboundReceivedResponse>> {
    if !state.inbound_verifier.is_configured() {
        return Err(AppError::NotFound(
            "inbound payment callbacks are not configured".to_owned(),
        )
        .into());
    }

    let signature = headers
        .get(PAYMENT_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Payment-Signature header is required".to_owned()))?;
    let payload = std::str::from_utf8(&body)
        .map_err(|_| AppError::Unauthorized("callback payload is not valid UTF-8".to_owned()))?;

    state
        .inbound_verifier
        .verify(payload, signature)
        .map_err(|error| {
            warn!(%error, "rejected inbound payment callback");
            AppError::Unauthorized(error.to_string())
        })?;

    info!(bytes = body.len(), "inbound payment callback verified");
    Ok(Json(InboundReceivedResponse { received: true }))
}
