use super::*;

impl PostgresWebhookRepository {
    pub(super) async fn save_webhook_impl(
        &self,
        tenant_id: TenantId,
        webhook: Webhook,
    ) -> AppResult<()> {
        let events: Vec<String> = webhook.events().iter().cloned().collect();
        let headers = serde_json::to_value(webhook.headers()).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize headers for webhook '{}': {error}",
                webhook.id()
            ))
        })?;
        let retry_strategy = webhook.retry_strategy();
        let max_attempts = i16::try_from(retry_strategy.max_attempts).map_err(|error| {
            AppError::Validation(format!("invalid webhook max_attempts value: {error}"))
        })?;
        let timeout_ms = i64::try_from(retry_strategy.timeout_ms).map_err(|error| {
            AppError::Validation(format!("invalid webhook timeout_ms value: {error}"))
        })?;
        let failure_count = i32::try_from(webhook.failure_count()).unwrap_or(i32::MAX);

        let result = sqlx::query(
            r#"
            INSERT INTO webhooks (
                id,
                tenant_id,
                name,
                url,
                description,
                events,
                secret,
                headers,
                status,
                max_attempts,
                backoff,
                timeout_ms,
                failure_count,
                last_triggered_at,
                last_success_at,
                last_error,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now())
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                url = EXCLUDED.url,
                description = EXCLUDED.description,
                events = EXCLUDED.events,
                secret = EXCLUDED.secret,
                headers = EXCLUDED.headers,
                max_attempts = EXCLUDED.max_attempts,
                backoff = EXCLUDED.backoff,
                timeout_ms = EXCLUDED.timeout_ms,
                updated_at = now()
            WHERE webhooks.tenant_id = EXCLUDED.tenant_id
            "#,
        )
        .bind(webhook.id().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(webhook.name().as_str())
        .bind(webhook.url().as_str())
        .bind(webhook.description())
        .bind(events)
        .bind(webhook.secret().expose())
        .bind(headers)
        .bind(webhook.status().as_str())
        .bind(max_attempts)
        .bind(retry_strategy.backoff.as_str())
        .bind(timeout_ms)
        .bind(failure_count)
        .bind(webhook.last_triggered_at())
        .bind(webhook.last_success_at())
        .bind(webhook.last_error())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save webhook '{}' for tenant '{}': {error}",
                webhook.id(),
                tenant_id
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "webhook '{}' belongs to another tenant",
                webhook.id()
            )));
        }

        Ok(())
    }

    pub(super) async fn pause_webhook_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        self.update_webhook_returning(tenant_id, webhook_id, "status = 'paused'", None, "pause")
            .await
    }

    pub(super) async fn reactivate_webhook_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        self.update_webhook_returning(
            tenant_id,
            webhook_id,
            "status = 'active', failure_count = 0, last_error = NULL",
            None,
            "reactivate",
        )
        .await
    }

    pub(super) async fn rotate_webhook_secret_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        secret: &WebhookSecret,
    ) -> AppResult<Option<Webhook>> {
        self.update_webhook_returning(
            tenant_id,
            webhook_id,
            "secret = $3",
            Some(secret.expose()),
            "rotate secret of",
        )
        .await
    }

    /// Single-statement update of the named columns; other columns keep
    /// whatever concurrent deliveries wrote.
    async fn update_webhook_returning(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        assignments: &str,
        secret: Option<&str>,
        operation: &str,
    ) -> AppResult<Option<Webhook>> {
        let sql = format!(
            r#"
            UPDATE webhooks
            SET {assignments}, updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {WEBHOOK_COLUMNS}
            "#
        );
        let mut query = sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(webhook_id.as_uuid());
        if let Some(secret) = secret {
            query = query.bind(secret);
        }

        let row = query.fetch_optional(&self.pool).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to {operation} webhook '{webhook_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        row.map(webhook_from_row).transpose()
    }

    pub(super) async fn list_webhooks_impl(&self, tenant_id: TenantId) -> AppResult<Vec<Webhook>> {
        let sql = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE tenant_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list webhooks for tenant '{tenant_id}': {error}"
                ))
            })?;

        rows.into_iter().map(webhook_from_row).collect()
    }

    pub(super) async fn find_webhook_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<Option<Webhook>> {
        let sql = format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(webhook_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find webhook '{webhook_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        row.map(webhook_from_row).transpose()
    }

    pub(super) async fn delete_webhook_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
    ) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM webhooks WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(webhook_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete webhook '{webhook_id}' for tenant '{tenant_id}': {error}"
                ))
            })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn list_active_webhooks_for_event_impl(
        &self,
        tenant_id: TenantId,
        event_type: &str,
    ) -> AppResult<Vec<Webhook>> {
        let sql = format!(
            r#"
            SELECT {WEBHOOK_COLUMNS}
            FROM webhooks
            WHERE tenant_id = $1
              AND status = 'active'
              AND $2 = ANY(events)
            ORDER BY created_at, id
            "#
        );
        let rows = sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(event_type)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list webhooks for event '{event_type}' tenant '{tenant_id}': {error}"
                ))
            })?;

        rows.into_iter().map(webhook_from_row).collect()
    }
}
