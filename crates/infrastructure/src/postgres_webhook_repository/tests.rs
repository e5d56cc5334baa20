use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use fieldflow_application::{WebhookDeliveryAttempt, WebhookDeliveryListQuery, WebhookRepository};
use fieldflow_core::TenantId;
use fieldflow_domain::{
    DeliveryAttemptId, DeliveryId, RetryStrategy, Webhook, WebhookInput, WebhookSecret,
    WebhookStatus,
};
use serde_json::json;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresWebhookRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres webhook tests: {error}");
    }

    Some(pool)
}

fn webhook() -> Webhook {
    let webhook = Webhook::new(WebhookInput {
        id: None,
        name: "Accounting sync".to_owned(),
        url: "https://hooks.example.com/fieldflow".to_owned(),
        description: None,
        events: BTreeSet::from(["job.status_changed".to_owned(), "invoice.created".to_owned()]),
        secret: WebhookSecret::new("whsec_0123456789abcdef").unwrap_or_else(|_| unreachable!()),
        headers: BTreeMap::from([("x-api-key".to_owned(), "abc123".to_owned())]),
        retry_strategy: RetryStrategy::default(),
    });
    assert!(webhook.is_ok());
    webhook.unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn webhooks_round_trip_and_filter_by_event() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresWebhookRepository::new(pool);
    let tenant_id = TenantId::new();
    let saved = webhook();
    assert!(
        repository
            .save_webhook(tenant_id, saved.clone())
            .await
            .is_ok()
    );

    let found = repository.find_webhook(tenant_id, saved.id()).await;
    assert!(found.is_ok());
    assert_eq!(found.unwrap_or_default(), Some(saved.clone()));

    let subscribed = repository
        .list_active_webhooks_for_event(tenant_id, "invoice.created")
        .await
        .unwrap_or_default();
    assert_eq!(subscribed.len(), 1);
    let unrelated = repository
        .list_active_webhooks_for_event(tenant_id, "lead.created")
        .await
        .unwrap_or_default();
    assert!(unrelated.is_empty());
    let other_tenant = repository
        .list_active_webhooks_for_event(TenantId::new(), "invoice.created")
        .await
        .unwrap_or_default();
    assert!(other_tenant.is_empty());
}

#[tokio::test]
async fn concurrent_failures_are_all_counted() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresWebhookRepository::new(pool);
    let tenant_id = TenantId::new();
    let saved = webhook();
    assert!(
        repository
            .save_webhook(tenant_id, saved.clone())
            .await
            .is_ok()
    );

    let mut tasks = tokio::task::JoinSet::new();
    for index in 0..5 {
        let repository = repository.clone();
        let webhook_id = saved.id();
        tasks.spawn(async move {
            repository
                .record_delivery_failure(tenant_id, webhook_id, &format!("HTTP 500 #{index}"), 5)
                .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        assert!(joined.is_ok_and(|result| result.is_ok()));
    }

    let stored = repository
        .find_webhook(tenant_id, saved.id())
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(stored.failure_count(), 5);
    assert_eq!(stored.status(), WebhookStatus::Failed);

    let health = repository
        .record_delivery_success(tenant_id, saved.id(), Utc::now())
        .await;
    assert!(health.is_ok());
    let health = health.unwrap_or_else(|_| unreachable!());
    assert_eq!(health.failure_count, 0);
    assert_eq!(health.last_error, None);
    assert_eq!(health.status, WebhookStatus::Failed);
}

#[tokio::test]
async fn delivery_log_is_newest_first_and_removed_with_webhook() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresWebhookRepository::new(pool);
    let tenant_id = TenantId::new();
    let saved = webhook();
    assert!(
        repository
            .save_webhook(tenant_id, saved.clone())
            .await
            .is_ok()
    );

    let delivery_id = DeliveryId::new();
    for attempt_number in 1..=2_u16 {
        let appended = repository
            .append_delivery_attempt(
                tenant_id,
                WebhookDeliveryAttempt {
                    id: DeliveryAttemptId::new(),
                    delivery_id,
                    webhook_id: saved.id(),
                    event_type: "job.status_changed".to_owned(),
                    payload: json!({"event": "job.status_changed"}),
                    response_status: Some(if attempt_number == 1 { 503 } else { 200 }),
                    response_body: Some("ok".to_owned()),
                    response_time_ms: 42,
                    error: None,
                    attempt_number,
                    delivered_at: Utc::now(),
                },
            )
            .await;
        assert!(appended.is_ok());
    }

    let attempts = repository
        .list_delivery_attempts(tenant_id, saved.id(), WebhookDeliveryListQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].attempt_number, 2);
    assert!(attempts[0].succeeded());
    assert!(attempts.iter().all(|attempt| attempt.delivery_id == delivery_id));

    assert!(matches!(
        repository.delete_webhook(tenant_id, saved.id()).await,
        Ok(true)
    ));
    let attempts = repository
        .list_delivery_attempts(tenant_id, saved.id(), WebhookDeliveryListQuery::default())
        .await
        .unwrap_or_default();
    assert!(attempts.is_empty());
}

#[tokio::test]
async fn rotation_and_pause_keep_concurrent_failure_counts() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresWebhookRepository::new(pool);
    let tenant_id = TenantId::new();
    let saved = webhook();
    assert!(
        repository
            .save_webhook(tenant_id, saved.clone())
            .await
            .is_ok()
    );
    assert!(
        repository
            .record_delivery_failure(tenant_id, saved.id(), "HTTP 503", 10)
            .await
            .is_ok()
    );

    let secret = WebhookSecret::new("whsec_rotated_0123456789").unwrap_or_else(|_| unreachable!());
    let rotated = repository
        .rotate_webhook_secret(tenant_id, saved.id(), &secret)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(rotated.secret(), &secret);
    assert_eq!(rotated.failure_count(), 1);

    // A stale definition upsert keeps the stored health columns.
    assert!(
        repository
            .save_webhook(tenant_id, saved.clone())
            .await
            .is_ok()
    );
    let paused = repository
        .pause_webhook(tenant_id, saved.id())
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(paused.status(), WebhookStatus::Paused);
    assert_eq!(paused.failure_count(), 1);
    assert_eq!(paused.last_error(), Some("HTTP 503"));

    let reactivated = repository
        .reactivate_webhook(tenant_id, saved.id())
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(reactivated.status(), WebhookStatus::Active);
    assert_eq!(reactivated.failure_count(), 0);

    let foreign = repository
        .pause_webhook(TenantId::new(), saved.id())
        .await
        .unwrap_or_default();
    assert!(foreign.is_none());
}
