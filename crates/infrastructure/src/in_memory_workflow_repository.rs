use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldflow_application::{
    ClaimRunOutcome, CreateRunOutcome, CreateWorkflowRunInput, DueWorkflowRun,
    FinishWorkflowRunInput, WorkflowRepository, WorkflowRun, WorkflowRunListQuery,
};
use fieldflow_core::{AppError, AppResult, TenantId};
use fieldflow_domain::{
    TriggerScope, TriggerType, Workflow, WorkflowId, WorkflowRunId, WorkflowRunStatus,
};
use tokio::sync::RwLock;


/// In-memory workflow repository for development and tests.
///
/// Every run mutation takes the single write lock, so claims are atomic.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<(TenantId, WorkflowId), Workflow>>,
    runs: RwLock<HashMap<WorkflowRunId, WorkflowRun>>,
}

impl InMemoryWorkflowRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_name(mut workflows: Vec<Workflow>) -> Vec<Workflow> {
    workflows.sort_by(|left, right| {
        left.name()
            .as_str()
            .cmp(right.name().as_str())
            .then_with(|| left.id().cmp(&right.id()))
    });
    workflows
}

fn tenant_run<'a>(
    runs: &'a mut HashMap<WorkflowRunId, WorkflowRun>,
    tenant_id: TenantId,
    run_id: WorkflowRunId,
) -> AppResult<&'a mut WorkflowRun> {
    runs.get_mut(&run_id)
        .filter(|run| run.tenant_id == tenant_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "workflow run '{run_id}' does not exist for tenant '{tenant_id}'"
            ))
        })
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save_workflow(&self, tenant_id: TenantId, workflow: Workflow) -> AppResult<()> {
        let mut workflows = self.workflows.write().await;
        if workflows
            .keys()
            .any(|(owner, workflow_id)| *workflow_id == workflow.id() && *owner != tenant_id)
        {
            return Err(AppError::Conflict(format!(
                "workflow '{}' belongs to another tenant",
                workflow.id()
            )));
        }

        workflows.insert((tenant_id, workflow.id()), workflow);
        Ok(())
    }

    async fn list_workflows(&self, tenant_id: TenantId) -> AppResult<Vec<Workflow>> {
        let workflows = self.workflows.read().await;
        Ok(sorted_by_name(
            workflows
                .iter()
                .filter_map(|((owner, _), workflow)| (*owner == tenant_id).then(|| workflow.clone()))
                .collect(),
        ))
    }

    async fn find_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>> {
        Ok(self
            .workflows
            .read()
            .await
            .get(&(tenant_id, workflow_id))
            .cloned())
    }

    async fn delete_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<bool> {
        let removed = self
            .workflows
            .write()
            .await
            .remove(&(tenant_id, workflow_id))
            .is_some();

        if removed {
            self.runs
                .write()
                .await
                .retain(|_, run| run.tenant_id != tenant_id || run.workflow_id != workflow_id);
        }

        Ok(removed)
    }

    async fn list_active_workflows_for_trigger(
        &self,
        tenant_id: TenantId,
        scope: TriggerScope,
        trigger_type: TriggerType,
    ) -> AppResult<Vec<Workflow>> {
        let workflows = self.workflows.read().await;
        Ok(sorted_by_name(
            workflows
                .iter()
                .filter_map(|((owner, _), workflow)| {
                    (*owner == tenant_id
                        && workflow.is_active()
                        && workflow.trigger_scope() == scope
                        && workflow.trigger_type() == trigger_type)
                        .then(|| workflow.clone())
                })
                .collect(),
        ))
    }

    async fn create_run(
        &self,
        tenant_id: TenantId,
        input: CreateWorkflowRunInput,
    ) -> AppResult<CreateRunOutcome> {
        let mut runs = self.runs.write().await;
        if let Some(active) = runs.values().find(|run| {
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
        runs.insert(run.id, run.clone());

        Ok(CreateRunOutcome::Created(run))
    }

    async fn claim_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<ClaimRunOutcome> {
        let mut runs = self.runs.write().await;
        let run = tenant_run(&mut runs, tenant_id, run_id)?;

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
        if !input.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "workflow run '{}' cannot finish as '{}'",
                input.run_id,
                input.status.as_str()
            )));
        }

        let mut runs = self.runs.write().await;
        let run = tenant_run(&mut runs, tenant_id, input.run_id)?;

        if run.status != WorkflowRunStatus::Running {
            return Err(AppError::Conflict(format!(
                "workflow run '{}' is {} and cannot move to {}",
                run.id,
                run.status.as_str(),
                input.status.as_str()
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
            .runs
            .read()
            .await
            .get(&run_id)
            .filter(|run| run.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_runs(
        &self,
        tenant_id: TenantId,
        query: WorkflowRunListQuery,
    ) -> AppResult<Vec<WorkflowRun>> {
        let runs = self.runs.read().await;
        let mut matching: Vec<&WorkflowRun> = runs
            .values()
            .filter(|run| run.tenant_id == tenant_id)
            .filter(|run| query.workflow_id.is_none_or(|id| run.workflow_id == id))
            .filter(|run| query.status.is_none_or(|status| run.status == status))
            .filter(|run| {
                query
                    .trigger_entity_id
                    .as_deref()
                    .is_none_or(|entity_id| run.trigger_entity_id == entity_id)
            })
            .collect();
        matching.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });

        Ok(matching
            .into_iter()
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
        let runs = self.runs.read().await;
        let mut due: Vec<DueWorkflowRun> = runs
            .values()
            .filter(|run| run.status == WorkflowRunStatus::Pending && run.scheduled_for <= due_before)
            .map(|run| DueWorkflowRun {
                tenant_id: run.tenant_id,
                run_id: run.id,
                scheduled_for: run.scheduled_for,
            })
            .collect();
        due.sort_by(|left, right| {
            left.scheduled_for
                .cmp(&right.scheduled_for)
                .then_with(|| left.run_id.cmp(&right.run_id))
        });
        due.truncate(limit);

        Ok(due)
    }

    async fn fail_stale_runs(&self, started_before: DateTime<Utc>, error: &str) -> AppResult<u64> {
        let mut runs = self.runs.write().await;
        let now = Utc::now();
        let mut reaped = 0_u64;

        for run in runs.values_mut().filter(|run| {
            run.status == WorkflowRunStatus::Running
                && run
                    .started_at
                    .is_some_and(|started_at| started_at < started_before)
        }) {
            run.status = WorkflowRunStatus::Failed;
            run.error = Some(error.to_owned());
            run.completed_at = Some(now);
            reaped += 1;
        }

        Ok(reaped)
    }
}
