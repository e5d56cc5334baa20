use super::*;

mod actions;
mod templating;

/// Per-run data shared by every action of one execution.
pub(super) struct RunContext<'a> {
    workflow: &'a Workflow,
    run: &'a WorkflowRun,
    entity: EntityReference,
}

impl WorkflowService {
    /// Claims and executes one pending run.
    ///
    /// Returns `None` when another executor claimed the run first.
    pub async fn execute_pending_run(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<Option<WorkflowRun>> {
        let run = match self.repository.claim_run(tenant_id, run_id).await? {
            ClaimRunOutcome::Claimed(run) => run,
            ClaimRunOutcome::NotPending(status) => {
                debug!(
                    tenant_id = %tenant_id,
                    run_id = %run_id,
                    status = status.as_str(),
                    "workflow run already claimed"
                );
                return Ok(None);
            }
        };

        let workflow = match self
            .repository
            .find_workflow(tenant_id, run.workflow_id)
            .await?
        {
            Some(workflow) if workflow.is_active() => workflow,
            Some(_) => {
                let failed = self
                    .finish_run(
                        tenant_id,
                        run.id,
                        WorkflowRunStatus::Failed,
                        Some("workflow was disabled before the run executed".to_owned()),
                    )
                    .await?;
                return Ok(Some(failed));
            }
            None => {
                let failed = self
                    .finish_run(
                        tenant_id,
                        run.id,
                        WorkflowRunStatus::Failed,
                        Some(format!("workflow '{}' no longer exists", run.workflow_id)),
                    )
                    .await?;
                return Ok(Some(failed));
            }
        };

        let context = RunContext {
            workflow: &workflow,
            run: &run,
            entity: EntityReference {
                tenant_id,
                entity_type: run.trigger_entity_type,
                entity_id: run.trigger_entity_id.clone(),
            },
        };

        let mut results = Vec::with_capacity(workflow.actions().len());
        for action in workflow.actions() {
            let result = self.execute_action(&context, action).await;
            if let Some(error) = &result.error {
                warn!(
                    tenant_id = %tenant_id,
                    run_id = %run.id,
                    action_type = result.action_type,
                    fatal = result.fatal,
                    error = %error,
                    "workflow action failed"
                );
            }
            results.push(result);
        }

        let (status, error) = run_outcome(&results);
        let finished = self.finish_run(tenant_id, run.id, status, error).await?;

        info!(
            tenant_id = %tenant_id,
            workflow_id = %workflow.id(),
            run_id = %finished.id,
            status = finished.status.as_str(),
            actions = results.len(),
            "workflow run finished"
        );
        Ok(Some(finished))
    }
}

/// Folds action results into the terminal run status.
///
/// Every action runs regardless of earlier failures. The run fails when the
/// last action failed or any fatal action failed; otherwise it completes and
/// recoverable failures are joined into the error text.
#[must_use]
pub fn run_outcome(results: &[ActionResult]) -> (WorkflowRunStatus, Option<String>) {
    let errors: Vec<String> = results
        .iter()
        .enumerate()
        .filter_map(|(index, result)| {
            result
                .error
                .as_ref()
                .map(|error| format!("action {} ({}): {error}", index + 1, result.action_type))
        })
        .collect();

    let last_failed = results.last().is_some_and(|result| !result.is_ok());
    let fatal_failed = results.iter().any(|result| result.fatal);
    let status = if last_failed || fatal_failed {
        WorkflowRunStatus::Failed
    } else {
        WorkflowRunStatus::Completed
    };

    (status, (!errors.is_empty()).then(|| errors.join("; ")))
}
