use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldflow_core::{AppResult, TenantId};
use fieldflow_domain::{TriggerScope, TriggerType, Workflow, WorkflowId, WorkflowRunId};

use super::execution::{
    ClaimRunOutcome, CreateRunOutcome, CreateWorkflowRunInput, DueWorkflowRun,
    FinishWorkflowRunInput, WorkflowRun, WorkflowRunListQuery,
};

/// Repository port for workflow definitions and the run ledger.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Inserts or replaces one workflow definition.
    async fn save_workflow(&self, tenant_id: TenantId, workflow: Workflow) -> AppResult<()>;

    /// Lists workflow definitions for a tenant.
    async fn list_workflows(&self, tenant_id: TenantId) -> AppResult<Vec<Workflow>>;

    /// Returns one workflow by id.
    async fn find_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>>;

    /// Deletes one workflow definition. Returns whether a row was removed.
    async fn delete_workflow(&self, tenant_id: TenantId, workflow_id: WorkflowId)
    -> AppResult<bool>;

    /// Lists active workflows for one trigger shape.
    async fn list_active_workflows_for_trigger(
        &self,
        tenant_id: TenantId,
        scope: TriggerScope,
        trigger_type: TriggerType,
    ) -> AppResult<Vec<Workflow>>;

    /// Creates a pending run unless one is already active for the same workflow and entity.
    async fn create_run(
        &self,
        tenant_id: TenantId,
        input: CreateWorkflowRunInput,
    ) -> AppResult<CreateRunOutcome>;

    /// Atomically moves a run from `pending` to `running`.
    async fn claim_run(&self, tenant_id: TenantId, run_id: WorkflowRunId)
    -> AppResult<ClaimRunOutcome>;

    /// Moves a running run to a terminal state.
    async fn finish_run(
        &self,
        tenant_id: TenantId,
        input: FinishWorkflowRunInput,
    ) -> AppResult<WorkflowRun>;

    /// Returns one run by id.
    async fn find_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<Option<WorkflowRun>>;

    /// Lists runs, newest first.
    async fn list_runs(
        &self,
        tenant_id: TenantId,
        query: WorkflowRunListQuery,
    ) -> AppResult<Vec<WorkflowRun>>;

    /// Lists pending runs due before `due_before` across tenants, earliest first.
    ///
    /// Only the scheduler calls this; it returns references, never run content.
    async fn list_due_runs(
        &self,
        due_before: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<DueWorkflowRun>>;

    /// Fails runs stuck in `running` since before `started_before`. Returns affected count.
    async fn fail_stale_runs(&self, started_before: DateTime<Utc>, error: &str) -> AppResult<u64>;
}
