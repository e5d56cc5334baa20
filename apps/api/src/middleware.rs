use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use fieldflow_core::{Actor, ActorRole, AppError, AppResult, TenantId};

use crate::error::ApiResult;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

/// Resolves the caller forwarded by the upstream auth layer into an [`Actor`] extension.
pub async fn require_identity(mut request: Request, next: Next) -> ApiResult<Response> {
    let actor = actor_from_headers(request.headers())?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

pub fn actor_from_headers(headers: &HeaderMap) -> AppResult<Actor> {
    let tenant_id = TenantId::parse(required_header(headers, TENANT_HEADER)?)
        .map_err(|_| AppError::Unauthorized(format!("{TENANT_HEADER} must be a UUID")))?;
    let subject = required_header(headers, USER_HEADER)?;

    // The system role is reserved for internal runtimes and cannot be forwarded.
    let role = match ActorRole::parse(required_header(headers, ROLE_HEADER)?)? {
        ActorRole::System => {
            return Err(AppError::Unauthorized(format!(
                "{ROLE_HEADER} must be 'admin' or 'member'"
            )));
        }
        role => role,
    };

    Ok(Actor::new(subject, tenant_id, role))
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("{name} header is required")))
}
