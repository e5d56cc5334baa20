use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldflow_core::{AppResult, TenantId};
use fieldflow_domain::{Webhook, WebhookHealth, WebhookId, WebhookSecret};

use super::delivery::{WebhookDeliveryAttempt, WebhookDeliveryListQuery};

/// Repository port for webhook subscriptions and their delivery log.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Inserts one webhook or replaces its definition.
    ///
    /// Health columns are written on insert only; afterwards they change
    /// through the targeted operations below.
    async fn save_webhook(&self, tenant_id: TenantId, webhook: Webhook) -> AppResult<()>;

    /// Sets status to `paused` without touching health counters.
    async fn pause_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>>;

    /// Sets status to `active` and clears the failure streak in one write.
    async fn reactivate_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>>;

    /// Replaces only the signing secret.
    async fn rotate_webhook_secret(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        secret: &WebhookSecret,
    ) -> AppResult<Option<Webhook>>;

    /// Lists webhooks for a tenant.
    async fn list_webhooks(&self, tenant_id: TenantId) -> AppResult<Vec<Webhook>>;

    /// Returns one webhook by id.
    async fn find_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>>;

    /// Deletes one webhook and its delivery log. Returns whether a row was removed.
    async fn delete_webhook(&self, tenant_id: TenantId, webhook_id: WebhookId) -> AppResult<bool>;

    /// Lists active webhooks subscribed to an event type.
    async fn list_active_webhooks_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>>;

    /// Appends one attempt record.
    async fn append_delivery_attempt(
        &self,
        tenant_id: TenantId,
        attempt: WebhookDeliveryAttempt,
    ) -> AppResult<()>;

    /// Lists attempt records for one webhook, newest first.
    async fn list_delivery_attempts(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        query: WebhookDeliveryListQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>>;

    /// Stamps the start of a logical delivery.
    async fn mark_triggered(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Resets the failure streak after a successful delivery.
    async fn record_delivery_success(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<WebhookHealth>;

    /// Increments the failure streak in one atomic write, flipping to `failed` at `threshold`.
    async fn record_delivery_failure(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        error: &str,
        threshold: u32,
    ) -> AppResult<WebhookHealth>;
}
