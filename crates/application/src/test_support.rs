//! In-memory fakes shared by service tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldflow_core::{AppError, AppResult, TenantId};
use fieldflow_domain::{
    TagId, TriggerScope, TriggerType, Webhook, WebhookHealth, WebhookId, WebhookSecret,
    WebhookStatus, Workflow,
    WorkflowId, WorkflowRunId, WorkflowRunStatus,
};
use tokio::sync::Mutex;

use crate::webhook_ports::{
    WebhookDeliveryAttempt, WebhookDeliveryListQuery, WebhookHttpClient, WebhookHttpRequest,
    WebhookHttpResponse, WebhookRepository,
};
use crate::workflow_ports::{
    ActionSideEffects, ClaimRunOutcome, CreateRunOutcome, CreateWorkflowRunInput, DueWorkflowRun,
    EntityReference, FinishWorkflowRunInput, WorkflowRepository, WorkflowRun,
    WorkflowRunListQuery,
};

#[derive(Default)]
struct WorkflowState {
    workflows: HashMap<(TenantId, WorkflowId), Workflow>,
    runs: Vec<WorkflowRun>,
    /// Storage errors returned by the next `finish_run` calls.
    finish_failures: usize,
}

#[derive(Default)]
pub(crate) struct FakeWorkflowRepository {
    state: Mutex<WorkflowState>,
}

impl FakeWorkflowRepository {
    pub(crate) async fn runs(&self) -> Vec<WorkflowRun> {
        self.state.lock().await.runs.clone()
    }

    pub(crate) async fn fail_next_finishes(&self, count: usize) {
        self.state.lock().await.finish_failures = count;
    }

    pub(crate) async fn backdate_start(&self, run_id: WorkflowRunId, started_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some(run) = state.runs.iter_mut().find(|run| run.id == run_id) {
            run.started_at = Some(started_at);
        }
    }
}

#[async_trait]
impl WorkflowRepository for FakeWorkflowRepository {
    async fn save_workflow(&self, tenant_id: TenantId, workflow: Workflow) -> AppResult<()> {
        self.state
            .lock()
            .await
            .workflows
            .insert((tenant_id, workflow.id()), workflow);
        Ok(())
    }

    async fn list_workflows(&self, tenant_id: TenantId) -> AppResult<Vec<Workflow>> {
        Ok(self
            .state
            .lock()
            .await
            .workflows
            .iter()
            .filter(|((stored_tenant_id, _), _)| *stored_tenant_id == tenant_id)
            .map(|(_, workflow)| workflow.clone())
            .collect())
    }

    async fn find_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>> {
        Ok(self
            .state
            .lock()
            .await
            .workflows
            .get(&(tenant_id, workflow_id))
            .cloned())
    }

    async fn delete_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .workflows
            .remove(&(tenant_id, workflow_id))
            .is_some())
    }

    async fn list_active_workflows_for_trigger(
        &self,
        tenant_id: TenantId,
        scope: TriggerScope,
        trigger_type: TriggerType,
    ) -> AppResult<Vec<Workflow>> {
        Ok(self
            .state
            .lock()
            .await
            .workflows
            .iter()
            .filter(|((stored_tenant_id, _), workflow)| {
                *stored_tenant_id == tenant_id
                    && workflow.is_active()
                    && workflow.trigger_scope() == scope
                    && workflow.trigger_type() == trigger_type
            })
            .map(|(_, workflow)| workflow.clone())
            .collect())
    }

    async fn create_run(
        &self,
        tenant_id: TenantId,
        input: CreateWorkflowRunInput,
    ) -> AppResult<CreateRunOutcome> {
        let mut state = self.state.lock().await;
        if let Some(active) = state.runs.iter().find(|run| {
            run.tenant_id == tenant_id
                && run.workflow_id == input.workflow_id
                && run.trigger_entity_id == input.trigger_entity_id
                && run.status.is_active()
        }) {
            return Ok(CreateRunOutcome::AlreadyActive(active.clone()));
        }

        let run = WorkflowRun {
            id: WorkflowRunId::new(),
            tenant_id,
            workflow_id: input.workflow_id,
            trigger_entity_type: input.trigger_entity_type,
            trigger_entity_id: input.trigger_entity_id,
            trigger_payload: input.trigger_payload,
            status: WorkflowRunStatus::Pending,
            error: None,
            scheduled_for: input.scheduled_for,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        state.runs.push(run.clone());
        Ok(CreateRunOutcome::Created(run))
    }

    async fn claim_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<ClaimRunOutcome> {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .iter_mut()
            .find(|run| run.tenant_id == tenant_id && run.id == run_id)
            .ok_or_else(|| AppError::NotFound(format!("workflow run '{run_id}' not found")))?;

        if run.status != WorkflowRunStatus::Pending {
            return Ok(ClaimRunOutcome::NotPending(run.status));
        }

        run.status = WorkflowRunStatus::Running;
        run.started_at = Some(Utc::now());
        Ok(ClaimRunOutcome::Claimed(run.clone()))
    }

    async fn finish_run(
        &self,
        tenant_id: TenantId,
        input: FinishWorkflowRunInput,
    ) -> AppResult<WorkflowRun> {
        let mut state = self.state.lock().await;
        if state.finish_failures > 0 {
            state.finish_failures -= 1;
            return Err(AppError::Internal(
                "connection reset while finishing workflow run".to_owned(),
            ));
        }

        let run = state
            .runs
            .iter_mut()
            .find(|run| run.tenant_id == tenant_id && run.id == input.run_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("workflow run '{}' not found", input.run_id))
            })?;

        if !run.status.can_transition_to(input.status) {
            return Err(AppError::Conflict(format!(
                "workflow run '{}' is {}",
                run.id,
                run.status.as_str()
            )));
        }

        run.status = input.status;
        run.error = input.error;
        run.completed_at = Some(Utc::now());
        Ok(run.clone())
    }

    async fn find_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<Option<WorkflowRun>> {
        Ok(self
            .state
            .lock()
            .await
            .runs
            .iter()
            .find(|run| run.tenant_id == tenant_id && run.id == run_id)
            .cloned())
    }

    async fn list_runs(
        &self,
        tenant_id: TenantId,
        query: WorkflowRunListQuery,
    ) -> AppResult<Vec<WorkflowRun>> {
        Ok(self
            .state
            .lock()
            .await
            .runs
            .iter()
            .rev()
            .filter(|run| run.tenant_id == tenant_id)
            .filter(|run| query.workflow_id.is_none_or(|id| run.workflow_id == id))
            .filter(|run| query.status.is_none_or(|status| run.status == status))
            .filter(|run| {
                query
                    .trigger_entity_id
                    .as_deref()
                    .is_none_or(|entity_id| run.trigger_entity_id == entity_id)
            })
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn list_due_runs(
        &self,
        due_before: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<DueWorkflowRun>> {
        let mut due: Vec<DueWorkflowRun> = self
            .state
            .lock()
            .await
            .runs
            .iter()
            .filter(|run| run.status == WorkflowRunStatus::Pending && run.scheduled_for <= due_before)
            .map(|run| DueWorkflowRun {
                tenant_id: run.tenant_id,
                run_id: run.id,
                scheduled_for: run.scheduled_for,
            })
            .collect();
        due.sort_by_key(|run| run.scheduled_for);
        due.truncate(limit);
        Ok(due)
    }

    async fn fail_stale_runs(&self, started_before: DateTime<Utc>, error: &str) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut reaped = 0;
        for run in state.runs.iter_mut().filter(|run| {
            run.status == WorkflowRunStatus::Running
                && run.started_at.is_some_and(|started_at| started_at < started_before)
        }) {
            run.status = WorkflowRunStatus::Failed;
            run.error = Some(error.to_owned());
            run.completed_at = Some(Utc::now());
            reaped += 1;
        }

        Ok(reaped)
    }
}

#[derive(Default)]
struct WebhookState {
    webhooks: HashMap<(TenantId, WebhookId), Webhook>,
    attempts: Vec<(TenantId, WebhookDeliveryAttempt)>,
    /// Failure committed by another delivery just before the next management access.
    concurrent_failure: Option<String>,
    /// Status another actor sets right after the next recorded attempt.
    status_after_attempt: Option<WebhookStatus>,
}

impl WebhookState {
    fn apply_concurrent_failure(&mut self, tenant_id: TenantId, webhook_id: WebhookId) {
        let Some(error) = self.concurrent_failure.take() else {
            return;
        };
        if let Some(webhook) = self.webhooks.get_mut(&(tenant_id, webhook_id)) {
            webhook.record_failure(error, u32::MAX);
        }
    }

    fn update(
        &mut self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        apply: impl FnOnce(&mut Webhook),
    ) -> Option<Webhook> {
        self.apply_concurrent_failure(tenant_id, webhook_id);
        self.webhooks.get_mut(&(tenant_id, webhook_id)).map(|webhook| {
            apply(webhook);
            webhook.clone()
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeWebhookRepository {
    state: Mutex<WebhookState>,
}

impl FakeWebhookRepository {
    pub(crate) async fn attempts(&self) -> Vec<WebhookDeliveryAttempt> {
        self.state
            .lock()
            .await
            .attempts
            .iter()
            .map(|(_, attempt)| attempt.clone())
            .collect()
    }

    pub(crate) async fn fail_concurrently_once(&self, error: &str) {
        self.state.lock().await.concurrent_failure = Some(error.to_owned());
    }

    pub(crate) async fn set_status_after_next_attempt(&self, status: WebhookStatus) {
        self.state.lock().await.status_after_attempt = Some(status);
    }

    pub(crate) async fn webhook(&self, tenant_id: TenantId, webhook_id: WebhookId) -> Option<Webhook> {
        self.state
            .lock()
            .await
            .webhooks
            .get(&(tenant_id, webhook_id))
            .cloned()
    }
}

#[async_trait]
impl WebhookRepository for FakeWebhookRepository {
    async fn save_webhook(&self, tenant_id: TenantId, webhook: Webhook) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let mut webhook = webhook;
        if let Some(stored) = state.webhooks.get(&(tenant_id, webhook.id())) {
            webhook.restore_health(stored.health());
        }
        state.webhooks.insert((tenant_id, webhook.id()), webhook);
        Ok(())
    }

    async fn pause_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        Ok(self
            .state
            .lock()
            .await
            .update(tenant_id, webhook_id, Webhook::pause))
    }

    async fn reactivate_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        Ok(self
            .state
            .lock()
            .await
            .update(tenant_id, webhook_id, Webhook::reactivate))
    }

    async fn rotate_webhook_secret(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        secret: &WebhookSecret,
    ) -> AppResult<Option<Webhook>> {
        Ok(self
            .state
            .lock()
            .await
            .update(tenant_id, webhook_id, |webhook| {
                webhook.rotate_secret(secret.clone());
            }))
    }

    async fn list_webhooks(&self, tenant_id: TenantId) -> AppResult<Vec<Webhook>> {
        Ok(self
            .state
            .lock()
            .await
            .webhooks
            .iter()
            .filter(|((stored_tenant_id, _), _)| *stored_tenant_id == tenant_id)
            .map(|(_, webhook)| webhook.clone())
            .collect())
    }

    async fn find_webhook(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        let mut state = self.state.lock().await;
        state.apply_concurrent_failure(tenant_id, webhook_id);
        Ok(state.webhooks.get(&(tenant_id, webhook_id)).cloned())
    }

    async fn delete_webhook(&self, tenant_id: TenantId, webhook_id: WebhookId) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        state
            .attempts
            .retain(|(stored_tenant_id, attempt)| {
                *stored_tenant_id != tenant_id || attempt.webhook_id != webhook_id
            });
        Ok(state.webhooks.remove(&(tenant_id, webhook_id)).is_some())
    }

    async fn list_active_webhooks_for_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>> {
        Ok(self
            .state
            .lock()
            .await
            .webhooks
            .iter()
            .filter(|((stored_tenant_id, _), webhook)| {
                *stored_tenant_id == tenant_id
                    && webhook.status() == WebhookStatus::Active
                    && webhook.subscribes_to(event_type)
            })
            .map(|(_, webhook)| webhook.clone())
            .collect())
    }

    async fn append_delivery_attempt(
        &self,
        tenant_id: TenantId,
        attempt: WebhookDeliveryAttempt,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let webhook_id = attempt.webhook_id;
        state.attempts.push((tenant_id, attempt));
        if let Some(status) = state.status_after_attempt.take()
            && let Some(webhook) = state.webhooks.get_mut(&(tenant_id, webhook_id))
        {
            let mut health = webhook.health();
            health.status = status;
            webhook.restore_health(health);
        }
        Ok(())
    }

    async fn list_delivery_attempts(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        query: WebhookDeliveryListQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        Ok(self
            .state
            .lock()
            .await
            .attempts
            .iter()
            .rev()
            .filter(|(stored_tenant_id, attempt)| {
                *stored_tenant_id == tenant_id && attempt.webhook_id == webhook_id
            })
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
        let mut state = self.state.lock().await;
        let webhook = state
            .webhooks
            .get_mut(&(tenant_id, webhook_id))
            .ok_or_else(|| AppError::NotFound(format!("webhook '{webhook_id}' not found")))?;
        webhook.record_triggered(at);
        Ok(())
    }

    async fn record_delivery_success(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<WebhookHealth> {
        let mut state = self.state.lock().await;
        let webhook = state
            .webhooks
            .get_mut(&(tenant_id, webhook_id))
            .ok_or_else(|| AppError::NotFound(format!("webhook '{webhook_id}' not found")))?;
        webhook.record_success(at);
        Ok(webhook.health())
    }

    async fn record_delivery_failure(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        error: &str,
        threshold: u32,
    ) -> AppResult<WebhookHealth> {
        let mut state = self.state.lock().await;
        let webhook = state
            .webhooks
            .get_mut(&(tenant_id, webhook_id))
            .ok_or_else(|| AppError::NotFound(format!("webhook '{webhook_id}' not found")))?;
        webhook.record_failure(error, threshold);
        Ok(webhook.health())
    }
}

/// Scripted HTTP endpoint. Unscripted calls answer with `default_status`.
pub(crate) struct FakeHttpClient {
    scripted: Mutex<VecDeque<Result<u16, String>>>,
    default_status: u16,
    delay: Option<Duration>,
    requests: Mutex<Vec<WebhookHttpRequest>>,
}

impl FakeHttpClient {
    pub(crate) fn answering(default_status: u16) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default_status,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn scripted(responses: Vec<Result<u16, String>>, default_status: u16) -> Self {
        Self {
            scripted: Mutex::new(responses.into()),
            ..Self::answering(default_status)
        }
    }

    pub(crate) fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::answering(200)
        }
    }

    pub(crate) async fn requests(&self) -> Vec<WebhookHttpRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl WebhookHttpClient for FakeHttpClient {
    async fn post(&self, request: WebhookHttpRequest) -> AppResult<WebhookHttpResponse> {
        self.requests.lock().await.push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.scripted.lock().await.pop_front();
        match scripted.unwrap_or(Ok(self.default_status)) {
            Ok(status) => Ok(WebhookHttpResponse {
                status,
                body: format!("{{\"status\":{status}}}"),
            }),
            Err(error) => Err(AppError::Internal(error)),
        }
    }
}

/// Records side-effect calls; tags in `missing_tags` do not exist.
#[derive(Default)]
pub(crate) struct RecordingSideEffects {
    calls: Mutex<Vec<String>>,
    missing_tags: HashSet<TagId>,
    sms_unavailable: bool,
}

impl RecordingSideEffects {
    pub(crate) fn with_missing_tag(mut self, tag_id: TagId) -> Self {
        self.missing_tags.insert(tag_id);
        self
    }

    pub(crate) fn with_sms_outage(mut self) -> Self {
        self.sms_unavailable = true;
        self
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ActionSideEffects for RecordingSideEffects {
    async fn send_email(
        &self,
        entity: &EntityReference,
        to: Option<&str>,
        subject: &str,
        _body: &str,
    ) -> AppResult<()> {
        self.calls.lock().await.push(format!(
            "email:{}:{}:{subject}",
            entity.entity_id,
            to.unwrap_or("contact")
        ));
        Ok(())
    }

    async fn send_sms(
        &self,
        entity: &EntityReference,
        _to: Option<&str>,
        message: &str,
    ) -> AppResult<()> {
        if self.sms_unavailable {
            return Err(AppError::Internal("sms provider unavailable".to_owned()));
        }

        self.calls
            .lock()
            .await
            .push(format!("sms:{}:{message}", entity.entity_id));
        Ok(())
    }

    async fn assign_tag(&self, entity: &EntityReference, tag_id: TagId) -> AppResult<()> {
        if self.missing_tags.contains(&tag_id) {
            return Err(AppError::NotFound(format!("tag '{tag_id}' does not exist")));
        }

        self.calls
            .lock()
            .await
            .push(format!("assign_tag:{}:{tag_id}", entity.entity_id));
        Ok(())
    }

    async fn remove_tag(&self, entity: &EntityReference, tag_id: TagId) -> AppResult<()> {
        if self.missing_tags.contains(&tag_id) {
            return Err(AppError::NotFound(format!("tag '{tag_id}' does not exist")));
        }

        self.calls
            .lock()
            .await
            .push(format!("remove_tag:{}:{tag_id}", entity.entity_id));
        Ok(())
    }

    async fn update_status(&self, entity: &EntityReference, status: &str) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push(format!("update_status:{}:{status}", entity.entity_id));
        Ok(())
    }
}
