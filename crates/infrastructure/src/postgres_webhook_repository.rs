use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldflow_application::{WebhookDeliveryAttempt, WebhookDeliveryListQuery, WebhookRepository};
use fieldflow_core::{AppError, AppResult, TenantId};
use fieldflow_domain::{
    BackoffKind, DeliveryAttemptId, DeliveryId, RetryStrategy, Webhook, WebhookHealth, WebhookId,
    WebhookInput, WebhookSecret, WebhookStatus,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

mod deliveries;
mod subscriptions;

#[cfg(test)]
mod tests;

/// PostgreSQL-backed webhook repository.
#[derive(Clone)]
pub struct PostgresWebhookRepository {
    pool: PgPool,
}

impl PostgresWebhookRepository {
    /// Creates a webhook repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const WEBHOOK_COLUMNS: &str = r#"
    id,
    name,
    url,
    description,
    events,
    secret,
    headers,
    status,
    max_attempts,
    backoff,
    timeout_ms,
    failure_count,
    last_triggered_at,
    last_success_at,
    last_error
"#;

const HEALTH_COLUMNS: &str = "status, failure_count, last_triggered_at, last_success_at, last_error";

#[derive(Debug, FromRow)]
struct WebhookRow {
    id: Uuid,
    name: String,
    url: String,
    description: Option<String>,
    events: Vec<String>,
    secret: String,
    headers: Value,
    status: String,
    max_attempts: i16,
    backoff: String,
    timeout_ms: i64,
    failure_count: i32,
    last_triggered_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Debug, FromRow)]
struct WebhookHealthRow {
    status: String,
    failure_count: i32,
    last_triggered_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Debug, FromRow)]
struct DeliveryAttemptRow {
    id: Uuid,
    delivery_id: Uuid,
    webhook_id: Uuid,
    event_type: String,
    payload: Value,
    response_status: Option<i16>,
    response_body: Option<String>,
    response_time_ms: i64,
    error: Option<String>,
    attempt_number: i16,
    delivered_at: DateTime<Utc>,
}

#[async_trait]
impl WebhookRepository for PostgresWebhookRepository {
    async fn save_webhook(&self, tenant_id: TenantId, webhook: Webhook) -> AppResult<()> {
        self.save_webhook_impl(tenant_id, webhook).await
    }

    async fn pause_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        self.pause_webhook_impl(tenant_id, webhook_id).await
    }

    async fn reactivate_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        self.reactivate_webhook_impl(tenant_id, webhook_id).await
    }

    async fn rotate_webhook_secret(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        secret: &WebhookSecret,
    ) -> AppResult<Option<Webhook>> {
        self.rotate_webhook_secret_impl(tenant_id, webhook_id, secret)
            .await
    }

    async fn list_webhooks(&self, tenant_id: TenantId) -> AppResult<Vec<Webhook>> {
        self.list_webhooks_impl(tenant_id).await
    }

    async fn find_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        self.find_webhook_impl(tenant_id, webhook_id).await
    }

    async fn delete_webhook(&self, tenant_id: TenantId, webhook_id: WebhookId) -> AppResult<bool> {
        self.delete_webhook_impl(tenant_id, webhook_id).await
    }

    async fn list_active_webhooks_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>> {
        self.list_active_webhooks_for_event_impl(tenant_id, event_type)
            .await
    }

    async fn append_delivery_attempt(
        &self,
        tenant_id: TenantId,
        attempt: WebhookDeliveryAttempt,
    ) -> AppResult<()> {
        self.append_delivery_attempt_impl(tenant_id, attempt).await
    }

    async fn list_delivery_attempts(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        query: WebhookDeliveryListQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        self.list_delivery_attempts_impl(tenant_id, webhook_id, query)
            .await
    }

    async fn mark_triggered(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.mark_triggered_impl(tenant_id, webhook_id, at).await
    }

    async fn record_delivery_success(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<WebhookHealth> {
        self.record_delivery_success_impl(tenant_id, webhook_id, at)
            .await
    }

    async fn record_delivery_failure(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        error: &str,
        threshold: u32,
    ) -> AppResult<WebhookHealth> {
        self.record_delivery_failure_impl(tenant_id, webhook_id, error, threshold)
            .await
    }
}

fn webhook_from_row(row: WebhookRow) -> AppResult<Webhook> {
    let headers: BTreeMap<String, String> = serde_json::from_value(row.headers).map_err(|error| {
        AppError::Internal(format!(
            "persisted headers for webhook '{}' are invalid: {error}",
            row.id
        ))
    })?;
    let max_attempts = u16::try_from(row.max_attempts).map_err(|error| {
        AppError::Internal(format!(
            "persisted max_attempts for webhook '{}' is invalid: {error}",
            row.id
        ))
    })?;
    let timeout_ms = u64::try_from(row.timeout_ms).map_err(|error| {
        AppError::Internal(format!(
            "persisted timeout_ms for webhook '{}' is invalid: {error}",
            row.id
        ))
    })?;

    let health = health_from_row(WebhookHealthRow {
        status: row.status,
        failure_count: row.failure_count,
        last_triggered_at: row.last_triggered_at,
        last_success_at: row.last_success_at,
        last_error: row.last_error,
    })?;

    Webhook::restore(
        WebhookInput {
            id: Some(WebhookId::from_uuid(row.id)),
            name: row.name,
            url: row.url,
            description: row.description,
            events: row.events.into_iter().collect::<BTreeSet<_>>(),
            secret: WebhookSecret::new(row.secret)?,
            headers,
            retry_strategy: RetryStrategy {
                max_attempts,
                backoff: BackoffKind::parse(row.backoff.as_str())?,
                timeout_ms,
            },
        },
        health,
    )
}

fn health_from_row(row: WebhookHealthRow) -> AppResult<WebhookHealth> {
    Ok(WebhookHealth {
        status: WebhookStatus::parse(row.status.as_str())?,
        failure_count: u32::try_from(row.failure_count).map_err(|error| {
            AppError::Internal(format!("persisted failure_count is invalid: {error}"))
        })?,
        last_triggered_at: row.last_triggered_at,
        last_success_at: row.last_success_at,
        last_error: row.last_error,
    })
}

fn attempt_from_row(row: DeliveryAttemptRow) -> AppResult<WebhookDeliveryAttempt> {
    let response_status = row
        .response_status
        .map(u16::try_from)
        .transpose()
        .map_err(|error| {
            AppError::Internal(format!(
                "persisted response status for attempt '{}' is invalid: {error}",
                row.id
            ))
        })?;

    Ok(WebhookDeliveryAttempt {
        id: DeliveryAttemptId::from_uuid(row.id),
        delivery_id: DeliveryId::from_uuid(row.delivery_id),
        webhook_id: WebhookId::from_uuid(row.webhook_id),
        event_type: row.event_type,
        payload: row.payload,
        response_status,
        response_body: row.response_body,
        response_time_ms: u64::try_from(row.response_time_ms).unwrap_or_default(),
        error: row.error,
        attempt_number: u16::try_from(row.attempt_number).map_err(|error| {
            AppError::Internal(format!(
                "persisted attempt number for attempt '{}' is invalid: {error}",
                row.id
            ))
        })?,
        delivered_at: row.delivered_at,
    })
}
