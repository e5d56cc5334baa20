use super::*;

impl PostgresWebhookRepository {
    pub(super) async fn append_delivery_attempt_impl(
        &self,
        tenant_id: TenantId,
        attempt: WebhookDeliveryAttempt,
    ) -> AppResult<()> {
        let response_status = attempt
            .response_status
            .map(i16::try_from)
            .transpose()
            .map_err(|error| {
                AppError::Validation(format!("invalid delivery response status: {error}"))
            })?;
        let attempt_number = i16::try_from(attempt.attempt_number).map_err(|error| {
            AppError::Validation(format!("invalid delivery attempt number: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (
                id,
                tenant_id,
                webhook_id,
                delivery_id,
                event_type,
                payload,
                response_status,
                response_body,
                response_time_ms,
                error,
                attempt_number,
                delivered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(attempt.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(attempt.webhook_id.as_uuid())
        .bind(attempt.delivery_id.as_uuid())
        .bind(attempt.event_type.as_str())
        .bind(&attempt.payload)
        .bind(response_status)
        .bind(attempt.response_body.as_deref())
        .bind(i64::try_from(attempt.response_time_ms).unwrap_or(i64::MAX))
        .bind(attempt.error.as_deref())
        .bind(attempt_number)
        .bind(attempt.delivered_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record delivery attempt {} of '{}' for webhook '{}': {error}",
                attempt.attempt_number, attempt.delivery_id, attempt.webhook_id
            ))
        })?;

        Ok(())
    }

    pub(super) async fn list_delivery_attempts_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        query: WebhookDeliveryListQuery,
    ) -> AppResult<Vec<WebhookDeliveryAttempt>> {
        let limit = i64::try_from(query.limit)
            .map_err(|error| AppError::Validation(format!("invalid limit value: {error}")))?;
        let offset = i64::try_from(query.offset)
            .map_err(|error| AppError::Validation(format!("invalid offset value: {error}")))?;

        let rows = sqlx::query_as::<_, DeliveryAttemptRow>(
            r#"
            SELECT
                id,
                delivery_id,
                webhook_id,
                event_type,
                payload,
                response_status,
                response_body,
                response_time_ms,
                error,
                attempt_number,
                delivered_at
            FROM webhook_deliveries
            WHERE tenant_id = $1 AND webhook_id = $2
            ORDER BY delivered_at DESC, attempt_number DESC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(webhook_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list deliveries for webhook '{webhook_id}' tenant '{tenant_id}': {error}"
            ))
        })?;

        rows.into_iter().map(attempt_from_row).collect()
    }

    pub(super) async fn mark_triggered_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE webhooks
            SET last_triggered_at = $3, updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(webhook_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to stamp webhook '{webhook_id}' for tenant '{tenant_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "webhook '{webhook_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        Ok(())
    }

    pub(super) async fn record_delivery_success_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        at: DateTime<Utc>,
    ) -> AppResult<WebhookHealth> {
        let sql = format!(
            r#"
            UPDATE webhooks
            SET failure_count = 0, last_success_at = $3, last_error = NULL, updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {HEALTH_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, WebhookHealthRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(webhook_id.as_uuid())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to record success for webhook '{webhook_id}' tenant '{tenant_id}': {error}"
                ))
            })?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "webhook '{webhook_id}' does not exist for tenant '{tenant_id}'"
                ))
            })?;

        health_from_row(row)
    }

    pub(super) async fn record_delivery_failure_impl(
        &self,
        tenant_id: TenantId,
        webhook_id: WebhookId,
        error: &str,
        threshold: u32,
    ) -> AppResult<WebhookHealth> {
        let threshold = i32::try_from(threshold.max(1)).unwrap_or(i32::MAX);
        // SET expressions read the pre-update row, so both use the old count.
        let sql = format!(
            r#"
            UPDATE webhooks
            SET
                failure_count = failure_count + 1,
                last_error = $3,
                status = CASE
                    WHEN status = 'active' AND failure_count + 1 >= $4 THEN 'failed'
                    ELSE status
                END,
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {HEALTH_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, WebhookHealthRow>(&sql)
            .bind(tenant_id.as_uuid())
            .bind(webhook_id.as_uuid())
            .bind(error)
            .bind(threshold)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to record failure for webhook '{webhook_id}' tenant '{tenant_id}': {error}"
                ))
            })?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "webhook '{webhook_id}' does not exist for tenant '{tenant_id}'"
                ))
            })?;

        health_from_row(row)
    }
}
