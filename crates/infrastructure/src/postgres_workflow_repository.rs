use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldflow_application::{
    ClaimRunOutcome, CreateRunOutcome, CreateWorkflowRunInput, DueWorkflowRun,
    FinishWorkflowRunInput, WorkflowRepository, WorkflowRun, WorkflowRunListQuery,
};
use fieldflow_core::{AppError, AppResult, TenantId};
use fieldflow_domain::{
    TagId, TriggerScope, TriggerType, Workflow, WorkflowAction, WorkflowConditions, WorkflowId,
    WorkflowInput, WorkflowRunId, WorkflowRunStatus,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

mod definitions;
mod runs;


/// PostgreSQL-backed workflow repository.
#[derive(Clone)]
pub struct PostgresWorkflowRepository {
    pool: PgPool,
}

impl PostgresWorkflowRepository {
    /// Creates a workflow repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const WORKFLOW_COLUMNS: &str = r#"
    id,
    name,
    description,
    trigger_scope,
    trigger_type,
    trigger_tag_id,
    conditions,
    actions,
    delay_minutes,
    is_active,
    is_system
"#;

const RUN_COLUMNS: &str = r#"
    id,
    tenant_id,
    workflow_id,
    trigger_entity_type,
    trigger_entity_id,
    trigger_payload,
    status,
    error,
    scheduled_for,
    created_at,
    started_at,
    completed_at
"#;

#[derive(Debug, FromRow)]
struct WorkflowRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    trigger_scope: String,
    trigger_type: String,
    trigger_tag_id: Option<Uuid>,
    conditions: Value,
    actions: Value,
    delay_minutes: i32,
    is_active: bool,
    is_system: bool,
}

#[derive(Debug, FromRow)]
struct WorkflowRunRow {
    id: Uuid,
    tenant_id: Uuid,
    workflow_id: Uuid,
    trigger_entity_type: String,
    trigger_entity_id: String,
    trigger_payload: Value,
    status: String,
    error: Option<String>,
    scheduled_for: DateTime<Utc>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct DueRunRow {
    tenant_id: Uuid,
    id: Uuid,
    scheduled_for: DateTime<Utc>,
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn save_workflow(&self, tenant_id: TenantId, workflow: Workflow) -> AppResult<()> {
        self.save_workflow_impl(tenant_id, workflow).await
    }

    async fn list_workflows(&self, tenant_id: TenantId) -> AppResult<Vec<Workflow>> {
        self.list_workflows_impl(tenant_id).await
    }

    async fn find_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>> {
        self.find_workflow_impl(tenant_id, workflow_id).await
    }

    async fn delete_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<bool> {
        self.delete_workflow_impl(tenant_id, workflow_id).await
    }

    async fn list_active_workflows_for_trigger(
        &self,
        tenant_id: TenantId,
        scope: TriggerScope,
        trigger_type: TriggerType,
    ) -> AppResult<Vec<Workflow>> {
        self.list_active_workflows_for_trigger_impl(tenant_id, scope, trigger_type)
            .await
    }

    async fn create_run(
        &self,
        tenant_id: TenantId,
        input: CreateWorkflowRunInput,
    ) -> AppResult<CreateRunOutcome> {
        self.create_run_impl(tenant_id, input).await
    }

    async fn claim_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<ClaimRunOutcome> {
        self.claim_run_impl(tenant_id, run_id).await
    }

    async fn finish_run(
        &self,
        tenant_id: TenantId,
        input: FinishWorkflowRunInput,
    ) -> AppResult<WorkflowRun> {
        self.finish_run_impl(tenant_id, input).await
    }

    async fn find_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<Option<WorkflowRun>> {
        self.find_run_impl(tenant_id, run_id).await
    }

    async fn list_runs(
        &self,
        tenant_id: TenantId,
        query: WorkflowRunListQuery,
    ) -> AppResult<Vec<WorkflowRun>> {
        self.list_runs_impl(tenant_id, query).await
    }

    async fn list_due_runs(
        &self,
        due_before: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<DueWorkflowRun>> {
        self.list_due_runs_impl(due_before, limit).await
    }

    async fn fail_stale_runs(&self, started_before: DateTime<Utc>, error: &str) -> AppResult<u64> {
        self.fail_stale_runs_impl(started_before, error).await
    }
}

fn workflow_from_row(row: WorkflowRow) -> AppResult<Workflow> {
    let conditions: WorkflowConditions = serde_json::from_value(row.conditions).map_err(|error| {
        AppError::Internal(format!(
            "persisted conditions for workflow '{}' are invalid: {error}",
            row.id
        ))
    })?;
    let actions: Vec<WorkflowAction> = serde_json::from_value(row.actions).map_err(|error| {
        AppError::Internal(format!(
            "persisted actions for workflow '{}' are invalid: {error}",
            row.id
        ))
    })?;
    let delay_minutes = u32::try_from(row.delay_minutes).map_err(|error| {
        AppError::Internal(format!(
            "persisted delay for workflow '{}' is invalid: {error}",
            row.id
        ))
    })?;

    Workflow::new(WorkflowInput {
        id: Some(WorkflowId::from_uuid(row.id)),
        name: row.name,
        description: row.description,
        trigger_scope: TriggerScope::parse(row.trigger_scope.as_str())?,
        trigger_type: TriggerType::parse(row.trigger_type.as_str())?,
        trigger_tag_id: row.trigger_tag_id.map(TagId::from_uuid),
        conditions,
        actions,
        delay_minutes,
        is_active: row.is_active,
        is_system: row.is_system,
    })
}

fn workflow_run_from_row(row: WorkflowRunRow) -> AppResult<WorkflowRun> {
    Ok(WorkflowRun {
        id: WorkflowRunId::from_uuid(row.id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        workflow_id: WorkflowId::from_uuid(row.workflow_id),
        trigger_entity_type: TriggerScope::parse(row.trigger_entity_type.as_str())?,
        trigger_entity_id: row.trigger_entity_id,
        trigger_payload: row.trigger_payload,
        status: WorkflowRunStatus::parse(row.status.as_str())?,
        error: row.error,
        scheduled_for: row.scheduled_for,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
    })
}

fn page_bound(value: usize, label: &str) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid {label} value '{value}': {error}")))
}
