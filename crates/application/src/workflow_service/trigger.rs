use super::*;

impl WorkflowService {
    /// Returns active workflows matching the event's trigger shape, tag and conditions.
    ///
    /// An empty result is a normal outcome.
    pub async fn evaluate(&self, event: &EntityEvent) -> AppResult<Vec<Workflow>> {
        let candidates = self
            .repository
            .list_active_workflows_for_trigger(event.tenant_id, event.scope, event.trigger_type)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|workflow| {
                workflow.is_active()
                    && workflow.trigger_scope() == event.scope
                    && workflow.trigger_type() == event.trigger_type
                    && tag_matches(workflow, event)
                    && matches_conditions(workflow.conditions(), &event.entity_snapshot)
            })
            .collect())
    }

    /// Entry point for entity mutations.
    ///
    /// Creates one pending run per matching workflow. Immediate runs execute
    /// in place when the service runs inline; everything else waits for the scheduler.
    /// An inline execution error fails that run and moves on to the next workflow.
    pub async fn on_entity_event(&self, event: EntityEvent) -> AppResult<EventDispatchSummary> {
        event.validate()?;

        let workflows = self.evaluate(&event).await?;
        let mut summary = EventDispatchSummary {
            matched_workflows: workflows.len(),
            ..EventDispatchSummary::default()
        };

        let now = Utc::now();
        for workflow in workflows {
            let scheduled_for =
                now + chrono::Duration::minutes(i64::from(workflow.delay_minutes()));
            let outcome = self
                .repository
                .create_run(
                    event.tenant_id,
                    CreateWorkflowRunInput {
                        workflow_id: workflow.id(),
                        trigger_entity_type: event.scope,
                        trigger_entity_id: event.entity_id.clone(),
                        trigger_payload: event.entity_snapshot.clone(),
                        scheduled_for,
                    },
                )
                .await?;

            let run = match outcome {
                CreateRunOutcome::Created(run) => run,
                CreateRunOutcome::AlreadyActive(active) => {
                    debug!(
                        tenant_id = %event.tenant_id,
                        workflow_id = %workflow.id(),
                        run_id = %active.id,
                        entity_id = %event.entity_id,
                        "workflow run already active for entity"
                    );
                    summary.skipped_active += 1;
                    continue;
                }
            };

            info!(
                tenant_id = %event.tenant_id,
                workflow_id = %workflow.id(),
                run_id = %run.id,
                entity_id = %event.entity_id,
                delay_minutes = workflow.delay_minutes(),
                "workflow run created"
            );

            let run = if workflow.delay_minutes() == 0
                && self.execution_mode == WorkflowExecutionMode::Inline
            {
                let run_id = run.id;
                match self.execute_pending_run(event.tenant_id, run_id).await {
                    Ok(executed) => executed.unwrap_or(run),
                    Err(error) => {
                        warn!(
                            tenant_id = %event.tenant_id,
                            workflow_id = %workflow.id(),
                            run_id = %run_id,
                            error = %error,
                            "inline workflow run execution failed"
                        );
                        self.fail_interrupted_run(event.tenant_id, run_id, &error)
                            .await
                            .unwrap_or(run)
                    }
                }
            } else {
                run
            };

            summary.runs.push(run);
        }

        Ok(summary)
    }

    /// Creates and executes a run for one entity outside the event path.
    pub async fn run_workflow_now(
        &self,
        actor: &Actor,
        workflow_id: WorkflowId,
        entity_id: String,
        entity_snapshot: Value,
    ) -> AppResult<WorkflowRun> {
        actor.require_manage()?;

        if entity_id.trim().is_empty() {
            return Err(AppError::Validation(
                "manual workflow run requires a non-empty entity_id".to_owned(),
            ));
        }

        if !entity_snapshot.is_object() {
            return Err(AppError::Validation(
                "manual workflow run snapshot must be a JSON object".to_owned(),
            ));
        }

        let workflow = self.load_workflow(actor.tenant_id(), workflow_id).await?;
        if !workflow.is_active() {
            return Err(AppError::Conflict(format!(
                "workflow '{}' is disabled",
                workflow.name().as_str()
            )));
        }

        let run = match self
            .repository
            .create_run(
                actor.tenant_id(),
                CreateWorkflowRunInput {
                    workflow_id,
                    trigger_entity_type: workflow.trigger_scope(),
                    trigger_entity_id: entity_id.clone(),
                    trigger_payload: entity_snapshot,
                    scheduled_for: Utc::now(),
                },
            )
            .await?
        {
            CreateRunOutcome::Created(run) => run,
            CreateRunOutcome::AlreadyActive(active) => {
                return Err(AppError::Conflict(format!(
                    "workflow run '{}' is already {} for entity '{entity_id}'",
                    active.id,
                    active.status.as_str()
                )));
            }
        };

        info!(
            tenant_id = %actor.tenant_id(),
            workflow_id = %workflow_id,
            run_id = %run.id,
            subject = actor.subject(),
            "manual workflow run requested"
        );

        self.execute_pending_run(actor.tenant_id(), run.id)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "workflow run '{}' was claimed by another executor",
                    run.id
                ))
            })
    }
}

/// Tag filter: only tag triggers with a configured tag constrain the event tag.
fn tag_matches(workflow: &Workflow, event: &EntityEvent) -> bool {
    if !workflow.trigger_type().is_tag_trigger() {
        return true;
    }

    workflow
        .trigger_tag_id()
        .is_none_or(|tag_id| event.tag_id == Some(tag_id))
}
