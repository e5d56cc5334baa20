use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldflow_application::{WebhookDeliveryAttempt, WebhookDeliveryListQuery, WebhookRepository};
use fieldflow_core::{AppError, AppResult, TenantId};
use fieldflow_domain::{Webhook, WebhookHealth, WebhookId, WebhookSecret, WebhookStatus};
use tokio::sync::RwLock;

/// In-memory webhook repository for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryWebhookRepository {
    webhooks: RwLock<HashMap<(TenantId, WebhookId), Webhook>>,
    deliveries: RwLock<Vec<(TenantId, WebhookDeliveryAttempt)>>,
}

impl InMemoryWebhookRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn update_health<F>(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        apply: F,
    ) -> AppResult<WebhookHealth>
    where
        F: FnOnce(&mut Webhook) + Send,
    {
        let mut webhooks = self.webhooks.write().await;
        let webhook = webhooks.get_mut(&(tenant_id, webhook_id)).ok_or_else(|| {
            AppError::NotFound(format!(
                "webhook '{webhook_id}' does not exist for tenant '{tenant_id}'"
            ))
        })?;

        apply(webhook);
        Ok(webhook.health())
    }

    async fn update_webhook<F>(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        apply: F,
    ) -> AppResult<Option<Webhook>>
    where
        F: FnOnce(&mut Webhook) + Send,
    {
        let mut webhooks = self.webhooks.write().await;
        Ok(webhooks.get_mut(&(tenant_id, webhook_id)).map(|webhook| {
            apply(webhook);
            webhook.clone()
        }))
    }
}

#[async_trait]
impl WebhookRepository for InMemoryWebhookRepository {
    async fn save_webhook(&self, tenant_id: TenantId, webhook: Webhook) -> AppResult<()> {
        let mut webhooks = self.webhooks.write().await;
        if webhooks
            .keys()
            .any(|(owner, webhook_id)| *webhook_id == webhook.id() && *owner != tenant_id)
        {
            return Err(AppError::Conflict(format!(
                "webhook '{}' belongs to another tenant",
                webhook.id()
            )));
        }

        let mut webhook = webhook;
        if let Some(stored) = webhooks.get(&(tenant_id, webhook.id())) {
            webhook.restore_health(stored.health());
        }

        webhooks.insert((tenant_id, webhook.id()), webhook);
        Ok(())
    }

    async fn pause_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        self.update_webhook(tenant_id, webhook_id, Webhook::pause)
            .await
    }

    async fn reactivate_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        self.update_webhook(tenant_id, webhook_id, Webhook::reactivate)
            .await
    }

    async fn rotate_webhook_secret(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        secret: &WebhookSecret,
    ) -> AppResult<Option<Webhook>> {
        let secret = secret.clone();
        self.update_webhook(tenant_id, webhook_id, move |webhook| {
            webhook.rotate_secret(secret);
        })
        .await
    }

    async fn list_webhooks(&self, tenant_id: TenantId) -> AppResult<Vec<Webhook>> {
        let webhooks = self.webhooks.read().await;
        let mut values: Vec<Webhook> = webhooks
            .iter()
            .filter_map(|((owner, _), webhook)| (*owner == tenant_id).then(|| webhook.clone()))
            .collect();
        values.sort_by(|left, right| {
            left.name()
                .as_str()
                .cmp(right.name().as_str())
                .then_with(|| left.id().cmp(&right.id()))
        });

        Ok(values)
    }

    async fn find_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        Ok(self
            .webhooks
            .read()
            .await
            .get(&(tenant_id, webhook_id))
            .cloned())
    }

    async fn delete_webhook(&self, tenant_id: TenantId, webhook_id: WebhookId) -> AppResult<bool> {
        let removed = self
            .webhooks
            .write()
            .await
            .remove(&(tenant_id, webhook_id))
            .is_some();

        if removed {
            self.deliveries.write().await.retain(|(owner, attempt)| {
                *owner != tenant_id || attempt.webhook_id != webhook_id
            });
        }

        Ok(removed)
    }

    async fn list_active_webhooks_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>> {
        Ok(self
            .list_webhooks(tenant_id)
            .await?
            .into_iter()
            .filter(|webhook| {
                webhook.status() == WebhookStatus::Active && webhook.subscribes_to(event_type)
            })
            .collect())
    }

    async fn append_delivery_attempt(
        &self,
        tenant_id: TenantId,
        attempt: WebhookDeliveryAttempt,
    ) -> AppResult<()> {
        self.deliveries.write().await.push((tenant_id, attempt));
        Ok(())
    }

    async fn list_delivery_attempts(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        query: WebhookDeliveryListQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        // Append order is delivery order, so reversing gives newest first.
        Ok(self
            .deliveries
            .read()
            .await
            .iter()
            .rev()
            .filter(|(owner, attempt)| *owner == tenant_id && attempt.webhook_id == webhook_id)
            .skip(query.offset)
            .take(query.limit)
            .map(|(_, attempt)| attempt.clone())
            .collect())
    }

    async fn mark_triggered(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.update_health(tenant_id, webhook_id, |webhook| webhook.record_triggered(at))
            .await
            .map(|_| ())
    }

    async fn record_delivery_success(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<WebhookHealth> {
        self.update_health(tenant_id, webhook_id, |webhook| webhook.record_success(at))
            .await
    }

    async fn record_delivery_failure(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        error: &str,
        threshold: u32,
    ) -> AppResult<WebhookHealth> {
        self.update_health(tenant_id, webhook_id, |webhook| {
            webhook.record_failure(error, threshold)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;

    use chrono::Utc;
    use fieldflow_application::{
        WebhookDeliveryAttempt, WebhookDeliveryListQuery, WebhookRepository,
    };
    use fieldflow_core::{AppError, TenantId};
    use fieldflow_domain::{
        DeliveryAttemptId, DeliveryId, RetryStrategy, Webhook, WebhookInput, WebhookSecret,
        WebhookStatus,
    };
    use serde_json::json;

    use super::InMemoryWebhookRepository;

    fn webhook(events: &[&str]) -> Webhook {
        let webhook = Webhook::new(WebhookInput {
            id: None,
            name: "CRM".to_owned(),
            url: "https://crm.example.com/hooks".to_owned(),
            description: None,
            events: events.iter().map(|event| (*event).to_owned()).collect::<BTreeSet<_>>(),
            secret: WebhookSecret::new("whsec_fedcba9876543210").unwrap_or_else(|_| unreachable!()),
            headers: BTreeMap::new(),
            retry_strategy: RetryStrategy::default(),
        });
        assert!(webhook.is_ok());
        webhook.unwrap_or_else(|_| unreachable!())
    }

    fn attempt(webhook: &Webhook, attempt_number: u16) -> WebhookDeliveryAttempt {
        WebhookDeliveryAttempt {
            id: DeliveryAttemptId::new(),
            delivery_id: DeliveryId::new(),
            webhook_id: webhook.id(),
            event_type: "lead.created".to_owned(),
            payload: json!({"event": "lead.created"}),
            response_status: Some(200),
            response_body: None,
            response_time_ms: 5,
            error: None,
            attempt_number,
            delivered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn event_lookup_skips_paused_and_unsubscribed_webhooks() {
        let repository = InMemoryWebhookRepository::new();
        let tenant_id = TenantId::new();
        let subscribed = webhook(&["lead.created"]);
        let mut paused = webhook(&["lead.created"]);
        paused.pause();
        let unrelated = webhook(&["invoice.paid"]);

        for hook in [subscribed.clone(), paused, unrelated] {
            assert!(repository.save_webhook(tenant_id, hook).await.is_ok());
        }

        let active = repository
            .list_active_webhooks_for_event(tenant_id, "lead.created")
            .await
            .unwrap_or_default();
        assert_eq!(active, vec![subscribed]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_flip_status_at_threshold() {
        let repository = Arc::new(InMemoryWebhookRepository::new());
        let tenant_id = TenantId::new();
        let hook = webhook(&["lead.created"]);
        assert!(repository.save_webhook(tenant_id, hook.clone()).await.is_ok());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..3 {
            let repository = Arc::clone(&repository);
            let webhook_id = hook.id();
            tasks.spawn(async move {
                repository
                    .record_delivery_failure(tenant_id, webhook_id, "HTTP 502", 3)
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            assert!(joined.is_ok_and(|result| result.is_ok()));
        }

        let stored = repository
            .find_webhook(tenant_id, hook.id())
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(stored.failure_count(), 3);
        assert_eq!(stored.status(), WebhookStatus::Failed);
        assert_eq!(stored.last_error(), Some("HTTP 502"));
    }

    #[tokio::test]
    async fn management_writes_leave_the_failure_streak_alone() {
        let repository = InMemoryWebhookRepository::new();
        let tenant_id = TenantId::new();
        let hook = webhook(&["lead.created"]);
        assert!(repository.save_webhook(tenant_id, hook.clone()).await.is_ok());
        assert!(
            repository
                .record_delivery_failure(tenant_id, hook.id(), "HTTP 503", 10)
                .await
                .is_ok()
        );

        let rotated = repository
            .rotate_webhook_secret(
                tenant_id,
                hook.id(),
                &WebhookSecret::new("whsec_rotated_0123456789").unwrap_or_else(|_| unreachable!()),
            )
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(rotated.failure_count(), 1);
        assert_eq!(rotated.secret().expose(), "whsec_rotated_0123456789");

        // Re-saving a stale definition must not roll the streak back.
        assert!(repository.save_webhook(tenant_id, hook.clone()).await.is_ok());
        let paused = repository
            .pause_webhook(tenant_id, hook.id())
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(paused.status(), WebhookStatus::Paused);
        assert_eq!(paused.failure_count(), 1);
        assert_eq!(paused.last_error(), Some("HTTP 503"));

        let reactivated = repository
            .reactivate_webhook(tenant_id, hook.id())
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| unreachable!());
        assert_eq!(reactivated.status(), WebhookStatus::Active);
        assert_eq!(reactivated.failure_count(), 0);
        assert_eq!(reactivated.last_error(), None);

        let missing = repository
            .pause_webhook(TenantId::new(), hook.id())
            .await
            .unwrap_or_default();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn delivery_log_pages_newest_first() {
        let repository = InMemoryWebhookRepository::new();
        let tenant_id = TenantId::new();
        let hook = webhook(&["lead.created"]);
        assert!(repository.save_webhook(tenant_id, hook.clone()).await.is_ok());

        for attempt_number in 1..=3 {
            assert!(
                repository
                    .append_delivery_attempt(tenant_id, attempt(&hook, attempt_number))
                    .await
                    .is_ok()
            );
        }

        let page = repository
            .list_delivery_attempts(
                tenant_id,
                hook.id(),
                WebhookDeliveryListQuery {
                    limit: 2,
                    offset: 0,
                },
            )
            .await
            .unwrap_or_default();
        assert_eq!(
            page.iter().map(|attempt| attempt.attempt_number).collect::<Vec<_>>(),
            vec![3, 2]
        );

        let other_tenant = repository
            .list_delivery_attempts(TenantId::new(), hook.id(), WebhookDeliveryListQuery::default())
            .await
            .unwrap_or_default();
        assert!(other_tenant.is_empty());
    }

    #[tokio::test]
    async fn health_updates_require_an_existing_webhook() {
        let repository = InMemoryWebhookRepository::new();
        let missing = webhook(&["lead.created"]);

        let result = repository
            .record_delivery_success(TenantId::new(), missing.id(), Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
