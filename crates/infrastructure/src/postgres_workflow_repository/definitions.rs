use super::*;

impl PostgresWorkflowRepository {
    pub(super) async fn save_workflow_impl(
        &self,
        tenant_id: TenantId,
        workflow: Workflow,
    ) -> AppResult<()> {
        let conditions = serde_json::to_value(workflow.conditions()).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize conditions for workflow '{}': {error}",
                workflow.id()
            ))
        })?;
        let actions = serde_json::to_value(workflow.actions()).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize actions for workflow '{}': {error}",
                workflow.id()
            ))
        })?;
        let delay_minutes = i32::try_from(workflow.delay_minutes()).map_err(|error| {
            AppError::Validation(format!("invalid workflow delay_minutes value: {error}"))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO workflows (
                id,
                tenant_id,
                name,
                description,
                trigger_scope,
                trigger_type,
                trigger_tag_id,
                conditions,
                actions,
                delay_minutes,
                is_active,
                is_system,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                trigger_scope = EXCLUDED.trigger_scope,
                trigger_type = EXCLUDED.trigger_type,
                trigger_tag_id = EXCLUDED.trigger_tag_id,
                conditions = EXCLUDED.conditions,
                actions = EXCLUDED.actions,
                delay_minutes = EXCLUDED.delay_minutes,
                is_active = EXCLUDED.is_active,
                is_system = EXCLUDED.is_system,
                updated_at = now()
            WHERE workflows.tenant_id = EXCLUDED.tenant_id
            "#,
        )
        .bind(workflow.id().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(workflow.name().as_str())
        .bind(workflow.description())
        .bind(workflow.trigger_scope().as_str())
        .bind(workflow.trigger_type().as_str())
        .bind(workflow.trigger_tag_id().map(|tag_id| tag_id.as_uuid()))
        .bind(conditions)
        .bind(actions)
        .bind(delay_minutes)
        .bind(workflow.is_active())
        .bind(workflow.is_system())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save workflow '{}' for tenant '{}': {error}",
                workflow.id(),
                tenant_id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "workflow '{}' belongs to another tenant",
                workflow.id()
            )));
        }

        Ok(())
    }

    pub(super) async fn list_workflows_impl(&self, tenant_id: TenantId) -> AppResult<Vec<Workflow>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE tenant_id = $1 ORDER BY name, id"
        );
        let rows = sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list workflows for tenant '{tenant_id}': {error}"
                ))
            })?;

        rows.into_iter().map(workflow_from_row).collect()
    }

    pub(super) async fn find_workflow_impl(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Option<Workflow>> {
        let sql =
            format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(workflow_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find workflow '{workflow_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        row.map(workflow_from_row).transpose()
    }

    pub(super) async fn delete_workflow_impl(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM workflows
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(workflow_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete workflow '{workflow_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn list_active_workflows_for_trigger_impl(
        &self,
        tenant_id: TenantId,
        scope: TriggerScope,
        trigger_type: TriggerType,
    ) -> AppResult<Vec<Workflow>> {
        let sql = format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            WHERE tenant_id = $1
              AND is_active = true
              AND trigger_scope = $2
              AND trigger_type = $3
            ORDER BY created_at, id
            "#
        );
        let rows = sqlx::query_as::<_, WorkflowRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(scope.as_str())
            .bind(trigger_type.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list trigger workflows for tenant '{tenant_id}': {error}"
                ))
            })?;

        rows.into_iter().map(workflow_from_row).collect()
    }
}
