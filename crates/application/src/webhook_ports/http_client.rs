use std::time::Duration;

use async_trait::async_trait;
use fieldflow_core::AppResult;

/// Outbound POST request built by the delivery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHttpRequest {
    /// Target endpoint.
    pub url: String,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: String,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

/// Captured response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

/// Port for outbound webhook HTTP calls.
///
/// Returns `Err` only when no response was received.
#[async_trait]
pub trait WebhookHttpClient: Send + Sync {
    /// Sends one POST request.
    async fn post(&self, request: WebhookHttpRequest) -> AppResult<WebhookHttpResponse>;
}
