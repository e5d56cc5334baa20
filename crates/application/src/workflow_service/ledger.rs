use super::*;

const MAX_PAGE_SIZE: usize = 500;

impl WorkflowService {
    /// Atomically claims a pending run for this executor.
    pub async fn claim_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<ClaimRunOutcome> {
        self.repository.claim_run(tenant_id, run_id).await
    }

    /// Lists runs for the actor tenant, newest first.
    pub async fn list_runs(
        &self,
        actor: &Actor,
        query: WorkflowRunListQuery,
    ) -> AppResult<Vec<WorkflowRun>> {
        if query.limit == 0 || query.limit > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        self.repository.list_runs(actor.tenant_id(), query).await
    }

    /// Returns one run.
    pub async fn find_run(&self, actor: &Actor, run_id: WorkflowRunId) -> AppResult<WorkflowRun> {
        self.repository
            .find_run(actor.tenant_id(), run_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "workflow run '{run_id}' does not exist for tenant '{}'",
                    actor.tenant_id()
                ))
            })
    }

    /// Lists pending runs due before `due_before`, earliest first.
    pub async fn list_due_runs(
        &self,
        due_before: chrono::DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<DueWorkflowRun>> {
        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        self.repository.list_due_runs(due_before, limit).await
    }

    /// Fails runs that have been `running` longer than `max_running`.
    pub async fn reap_stale_runs(&self, max_running: Duration) -> AppResult<u64> {
        let max_running = chrono::Duration::from_std(max_running)
            .map_err(|error| AppError::Validation(format!("invalid stale run window: {error}")))?;
        let reaped = self
            .repository
            .fail_stale_runs(
                Utc::now() - max_running,
                format!(
                    "run exceeded execution timeout of {}s",
                    max_running.num_seconds()
                )
                .as_str(),
            )
            .await?;

        if reaped > 0 {
            warn!(reaped, "failed stale workflow runs");
        }

        Ok(reaped)
    }

    /// Best-effort terminal write for a run whose execution errored.
    ///
    /// Returns `None` when the run could not be failed, e.g. it was never
    /// claimed or storage is still unavailable; the stale reaper covers those.
    pub(super) async fn fail_interrupted_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
        cause: &AppError,
    ) -> Option<WorkflowRun> {
        match self
            .finish_run(
                tenant_id,
                run_id,
                WorkflowRunStatus::Failed,
                Some(format!("run execution aborted: {cause}")),
            )
            .await
        {
            Ok(failed) => Some(failed),
            Err(error) => {
                warn!(
                    tenant_id = %tenant_id,
                    run_id = %run_id,
                    error = %error,
                    "failed to mark interrupted workflow run as failed"
                );
                None
            }
        }
    }

    pub(super) async fn finish_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
        status: WorkflowRunStatus,
        error: Option<String>,
    ) -> AppResult<WorkflowRun> {
        if !WorkflowRunStatus::Running.can_transition_to(status) {
            return Err(AppError::Internal(format!(
                "'{}' is not a terminal workflow run status",
                status.as_str()
            )));
        }

        self.repository
            .finish_run(
                tenant_id,
                FinishWorkflowRunInput {
                    run_id,
                    status,
                    error,
                },
            )
            .await
    }
}
