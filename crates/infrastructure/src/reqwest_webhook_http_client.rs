use async_trait::async_trait;
use fieldflow_application::{WebhookHttpClient, WebhookHttpRequest, WebhookHttpResponse};
use fieldflow_core::{AppError, AppResult};
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use tracing::debug;

/// `reqwest`-backed transport for outbound webhook deliveries.
#[derive(Clone)]
pub struct ReqwestWebhookHttpClient {
    http_client: reqwest::Client,
}

impl ReqwestWebhookHttpClient {
    /// Creates a transport around a shared client.
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Creates a transport with a dedicated client that never follows redirects.
    pub fn with_defaults() -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build webhook http client: {error}"))
            })?;

        Ok(Self::new(http_client))
    }
}

#[async_trait]
impl WebhookHttpClient for ReqwestWebhookHttpClient {
    async fn post(&self, request: WebhookHttpRequest) -> AppResult<WebhookHttpResponse> {
        let mut builder = self
            .http_client
            .post(request.url.as_str())
            .timeout(request.timeout)
            .header(CONTENT_TYPE, "application/json");

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|error| {
                AppError::Validation(format!("invalid webhook header name '{name}': {error}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|error| {
                AppError::Validation(format!("invalid value for webhook header '{name}': {error}"))
            })?;
            builder = builder.header(name, value);
        }

        let response = builder.body(request.body).send().await.map_err(|error| {
            let kind = if error.is_timeout() {
                "timed out"
            } else if error.is_connect() {
                "connection failed"
            } else {
                "transport error"
            };
            AppError::Internal(format!("webhook request {kind}: {error}"))
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response body unavailable>".to_owned());
        debug!(url = %request.url, status, "webhook endpoint responded");

        Ok(WebhookHttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fieldflow_application::{WebhookHttpClient, WebhookHttpRequest};
    use fieldflow_core::AppError;

    use super::ReqwestWebhookHttpClient;

    #[tokio::test]
    async fn invalid_header_names_are_rejected_before_sending() {
        let client = ReqwestWebhookHttpClient::with_defaults();
        assert!(client.is_ok());
        let client = client.unwrap_or_else(|_| unreachable!());

        let result = client
            .post(WebhookHttpRequest {
                url: "http://127.0.0.1:9/unreachable".to_owned(),
                headers: vec![("bad header".to_owned(), "value".to_owned())],
                body: "{}".to_owned(),
                timeout: Duration::from_millis(100),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
