use super::*;

const CREATE_RUN_RETRIES: usize = 3;

impl PostgresWorkflowRepository {
    pub(super) async fn create_run_impl(
        &self,
        tenant_id: TenantId,
        input: CreateWorkflowRunInput,
    ) -> AppResult<CreateRunOutcome> {
        let insert_sql = format!(
            r#"
            INSERT INTO workflow_runs (
                id,
                tenant_id,
                workflow_id,
                trigger_entity_type,
                trigger_entity_id,
                trigger_payload,
                status,
                scheduled_for
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            ON CONFLICT (tenant_id, workflow_id, trigger_entity_id)
                WHERE status IN ('pending', 'running')
            DO NOTHING
            RETURNING {RUN_COLUMNS}
            "#
        );
        let active_sql = format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM workflow_runs
            WHERE tenant_id = $1
              AND workflow_id = $2
              AND trigger_entity_id = $3
              AND status IN ('pending', 'running')
            "#
        );

        // The active run may finish between the conflicting insert and the lookup.
        for _ in 0..CREATE_RUN_RETRIES {
            let inserted = sqlx::query_as::<_, WorkflowRunRow>(&insert_sql)
                .bind(WorkflowRunId::new().as_uuid())
                .bind(tenant_id.as_uuid())
                .bind(input.workflow_id.as_uuid())
                .bind(input.trigger_entity_type.as_str())
                .bind(input.trigger_entity_id.as_str())
                .bind(&input.trigger_payload)
                .bind(input.scheduled_for)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to create run for workflow '{}' tenant '{}': {error}",
                        input.workflow_id, tenant_id
                    ))
                })?;

            if let Some(row) = inserted {
                return workflow_run_from_row(row).map(CreateRunOutcome::Created);
            }

            let active = sqlx::query_as::<_, WorkflowRunRow>(&active_sql)
                .bind(tenant_id.as_uuid())
                .bind(input.workflow_id.as_uuid())
                .bind(input.trigger_entity_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to load active run for workflow '{}' tenant '{}': {error}",
                        input.workflow_id, tenant_id
                    ))
                })?;

            if let Some(row) = active {
                return workflow_run_from_row(row).map(CreateRunOutcome::AlreadyActive);
            }
        }

        Err(AppError::Conflict(format!(
            "workflow '{}' run for entity '{}' kept conflicting with concurrent runs",
            input.workflow_id, input.trigger_entity_id
        )))
    }

    pub(super) async fn claim_run_impl(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<ClaimRunOutcome> {
        let sql = format!(
            r#"
            UPDATE workflow_runs
            SET status = 'running', started_at = now()
            WHERE tenant_id = $1 AND id = $2 AND status = 'pending'
            RETURNING {RUN_COLUMNS}
            "#
        );
        let claimed = sqlx::query_as::<_, WorkflowRunRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(run_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to claim workflow run '{run_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        if let Some(row) = claimed {
            return workflow_run_from_row(row).map(ClaimRunOutcome::Claimed);
        }

        let run = self.find_run_impl(tenant_id, run_id).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "workflow run '{run_id}' does not exist for tenant '{tenant_id}'"
            ))
        })?;

        Ok(ClaimRunOutcome::NotPending(run.status))
    }

    pub(super) async fn finish_run_impl(
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

        let sql = format!(
            r#"
            UPDATE workflow_runs
            SET status = $3, error = $4, completed_at = now()
            WHERE tenant_id = $1 AND id = $2 AND status = 'running'
            RETURNING {RUN_COLUMNS}
            "#
        );
        let finished = sqlx::query_as::<_, WorkflowRunRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(input.run_id.as_uuid())
            .bind(input.status.as_str())
            .bind(input.error.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to finish workflow run '{}' for tenant '{}': {error}",
                    input.run_id, tenant_id
                ))
            })?;

        if let Some(row) = finished {
            return workflow_run_from_row(row);
        }

        match self.find_run_impl(tenant_id, input.run_id).await? {
            Some(run) => Err(AppError::Conflict(format!(
                "workflow run '{}' is {} and cannot move to {}",
                run.id,
                run.status.as_str(),
                input.status.as_str()
            ))),
            None => Err(AppError::NotFound(format!(
                "workflow run '{}' does not exist for tenant '{}'",
                input.run_id, tenant_id
            ))),
        }
    }

    pub(super) async fn find_run_impl(
        &self,
        tenant_id: TenantId,
        run_id: WorkflowRunId,
    ) -> AppResult<Option<WorkflowRun>> {
        let sql =
            format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, WorkflowRunRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(run_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find workflow run '{run_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        row.map(workflow_run_from_row).transpose()
    }

    pub(super) async fn list_runs_impl(
        &self,
        tenant_id: TenantId,
        query: WorkflowRunListQuery,
    ) -> AppResult<Vec<WorkflowRun>> {
        let sql = format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM workflow_runs
            WHERE tenant_id = $1
              AND ($2::UUID IS NULL OR workflow_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
              AND ($4::TEXT IS NULL OR trigger_entity_id = $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            OFFSET $6
            "#
        );
        let rows = sqlx::query_as::<_, WorkflowRunRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(query.workflow_id.map(|workflow_id| workflow_id.as_uuid()))
            .bind(query.status.map(|status| status.as_str()))
            .bind(query.trigger_entity_id.as_deref())
            .bind(page_bound(query.limit, "limit")?)
            .bind(page_bound(query.offset, "offset")?)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list workflow runs for tenant '{tenant_id}': {error}"
                ))
            })?;

        rows.into_iter().map(workflow_run_from_row).collect()
    }

    pub(super) async fn list_due_runs_impl(
        &self,
        due_before: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<DueWorkflowRun>> {
        let rows = sqlx::query_as::<_, DueRunRow>(
            r#"
            SELECT tenant_id, id, scheduled_for
            FROM workflow_runs
            WHERE status = 'pending' AND scheduled_for <= $1
            ORDER BY scheduled_for, id
            LIMIT $2
            "#,
        )
        .bind(due_before)
        .bind(page_bound(limit, "limit")?)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to scan due workflow runs: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| DueWorkflowRun {
                tenant_id: TenantId::from_uuid(row.tenant_id),
                run_id: WorkflowRunId::from_uuid(row.id),
                scheduled_for: row.scheduled_for,
            })
            .collect())
    }

    pub(super) async fn fail_stale_runs_impl(
        &self,
        started_before: DateTime<Utc>,
        error: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_runs
            SET status = 'failed', error = $2, completed_at = now()
            WHERE status = 'running' AND started_at < $1
            "#,
        )
        .bind(started_before)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to reap stale workflow runs: {error}")))?;

        Ok(result.rows_affected())
    }
}
