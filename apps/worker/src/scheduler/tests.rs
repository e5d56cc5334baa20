use std::sync::Arc;
use std::time::Duration;

use fieldflow_application::{
    WebhookService, WorkflowExecutionMode, WorkflowRunListQuery, WorkflowService,
};
use fieldflow_core::{Actor, ActorRole, TenantId};
use fieldflow_domain::{
    EntityEvent, TriggerScope, TriggerType, WorkflowAction, WorkflowConditions, WorkflowInput,
    WorkflowRunStatus,
};
use fieldflow_infrastructure::{
    ConsoleActionSideEffects, InMemoryWebhookRepository, InMemoryWorkflowRepository,
    ReqwestWebhookHttpClient,
};
use serde_json::json;

use super::Scheduler;

fn queued_service() -> WorkflowService {
    let http_client = ReqwestWebhookHttpClient::with_defaults();
    assert!(http_client.is_ok());
    let webhook_service = WebhookService::new(
        Arc::new(InMemoryWebhookRepository::new()),
        Arc::new(http_client.unwrap_or_else(|_| unreachable!())),
    );

    WorkflowService::new(
        Arc::new(InMemoryWorkflowRepository::new()),
        Arc::new(ConsoleActionSideEffects::new()),
        webhook_service,
        WorkflowExecutionMode::Queued,
    )
}

async fn save_lead_workflow(service: &WorkflowService, actor: &Actor, delay_minutes: u32) {
    let saved = service
        .save_workflow(
            actor,
            WorkflowInput {
                id: None,
                name: "Lead follow-up".to_owned(),
                description: None,
                trigger_scope: TriggerScope::Lead,
                trigger_type: TriggerType::Created,
                trigger_tag_id: None,
                conditions: WorkflowConditions::new(),
                actions: vec![WorkflowAction::SendEmail {
                    to: Some("sales@example.com".to_owned()),
                    subject: "New lead {{entity.name}}".to_owned(),
                    body: "Call back within the hour".to_owned(),
                }],
                delay_minutes,
                is_active: true,
                is_system: false,
            },
        )
        .await;
    assert!(saved.is_ok());
}

async fn emit_lead(service: &WorkflowService, tenant_id: TenantId, entity_id: &str) {
    let summary = service
        .on_entity_event(EntityEvent {
            tenant_id,
            scope: TriggerScope::Lead,
            trigger_type: TriggerType::Created,
            tag_id: None,
            entity_id: entity_id.to_owned(),
            entity_snapshot: json!({"name": entity_id}),
        })
        .await;
    assert!(summary.is_ok_and(|summary| summary.runs.len() == 1));
}

fn scheduler(service: &WorkflowService, claim_limit: usize, lookahead: Duration) -> Scheduler {
    Scheduler::new(
        service.clone(),
        "worker-test",
        claim_limit,
        Duration::from_secs(3_600),
        lookahead,
        Duration::from_secs(900),
    )
}

#[tokio::test]
async fn due_runs_execute_within_the_claim_limit() {
    let service = queued_service();
    let tenant_id = TenantId::new();
    let actor = Actor::new("ops", tenant_id, ActorRole::Admin);
    save_lead_workflow(&service, &actor, 0).await;
    emit_lead(&service, tenant_id, "lead-1").await;
    emit_lead(&service, tenant_id, "lead-2").await;

    let mut scheduler = scheduler(&service, 1, Duration::from_secs(60));
    assert!(matches!(scheduler.hydrate().await, Ok(2)));
    assert!(matches!(scheduler.hydrate().await, Ok(0)));
    assert_eq!(scheduler.sleep_duration(), Duration::ZERO);

    assert_eq!(scheduler.dispatch_due(), 1);
    assert_eq!(scheduler.queued(), 1);
    assert_eq!(scheduler.dispatch_due(), 0);
    assert_eq!(scheduler.sleep_duration(), Duration::from_secs(3_600));

    scheduler.drain().await;
    assert_eq!(scheduler.dispatch_due(), 1);
    scheduler.drain().await;
    assert_eq!(scheduler.queued(), 0);

    let completed = service
        .list_runs(
            &actor,
            WorkflowRunListQuery {
                status: Some(WorkflowRunStatus::Completed),
                ..WorkflowRunListQuery::default()
            },
        )
        .await
        .unwrap_or_default();
    assert_eq!(completed.len(), 2);
}

#[tokio::test]
async fn delayed_runs_wait_for_their_due_time() {
    let service = queued_service();
    let tenant_id = TenantId::new();
    let actor = Actor::new("ops", tenant_id, ActorRole::Admin);
    save_lead_workflow(&service, &actor, 10).await;
    emit_lead(&service, tenant_id, "lead-9").await;

    let mut short_window = scheduler(&service, 4, Duration::from_secs(60));
    assert!(matches!(short_window.hydrate().await, Ok(0)));
    assert_eq!(short_window.sleep_duration(), Duration::from_secs(3_600));

    let mut long_window = scheduler(&service, 4, Duration::from_secs(3_600));
    assert!(matches!(long_window.hydrate().await, Ok(1)));
    let sleep_for = long_window.sleep_duration();
    assert!(sleep_for > Duration::from_secs(9 * 60));
    assert!(sleep_for <= Duration::from_secs(10 * 60));
    assert_eq!(long_window.dispatch_due(), 0);

    let pending = service
        .list_runs(&actor, WorkflowRunListQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, WorkflowRunStatus::Pending);
}

#[tokio::test]
async fn shutdown_stops_the_loop_after_draining() {
    let service = queued_service();
    let tenant_id = TenantId::new();
    let actor = Actor::new("ops", tenant_id, ActorRole::Admin);
    save_lead_workflow(&service, &actor, 0).await;
    emit_lead(&service, tenant_id, "lead-3").await;

    let scheduler = scheduler(&service, 2, Duration::from_secs(60));
    let run_loop = scheduler.run(tokio::time::sleep(Duration::from_millis(200)));
    assert!(
        tokio::time::timeout(Duration::from_secs(10), run_loop)
            .await
            .is_ok()
    );

    let runs = service
        .list_runs(&actor, WorkflowRunListQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, WorkflowRunStatus::Completed);
}
