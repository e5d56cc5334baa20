use super::*;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// `User-Agent` sent with every delivery.
pub const USER_AGENT: &str = concat!("fieldflow-webhooks/", env!("CARGO_PKG_VERSION"));
/// Event type header.
pub const HEADER_EVENT: &str = "X-Fieldflow-Event";
/// Logical delivery id header, shared by every attempt.
pub const HEADER_DELIVERY: &str = "X-Fieldflow-Delivery";
/// 1-based attempt number header.
pub const HEADER_ATTEMPT: &str = "X-Fieldflow-Attempt";
/// Unix timestamp covered by the signature.
pub const HEADER_TIMESTAMP: &str = "X-Fieldflow-Timestamp";
/// `t=<unix>,v1=<hex>` signature header.
pub const HEADER_SIGNATURE: &str = "X-Fieldflow-Signature";
/// Event type of user-triggered test deliveries.
pub const TEST_EVENT_TYPE: &str = "webhook.test";

const MAX_RESPONSE_BODY_CHARS: usize = 2_048;

#[derive(Serialize)]
struct WebhookEnvelope<'a> {
    event: &'a str,
    timestamp: DateTime<Utc>,
    tenant_id: TenantId,
    data: &'a Value,
    metadata: EnvelopeMetadata,
}

#[derive(Serialize)]
struct EnvelopeMetadata {
    webhook_id: WebhookId,
    delivery_id: DeliveryId,
}

impl WebhookService {
    /// Delivers one event to one webhook.
    ///
    /// Skips inactive or unsubscribed webhooks. Exhausted retries are
    /// reported as `DeliveryOutcome::Failed` and bump the failure streak once.
    /// A webhook paused, failed or deleted between attempts ends the delivery
    /// as `Interrupted` without touching health.
    pub async fn deliver(
        &self,
        tenant_id: TenantId,
        webhook: &Webhook,
        event_type: &str,
        data: Value,
    ) -> AppResult<DeliveryOutcome> {
        if webhook.status() != WebhookStatus::Active {
            return Ok(DeliveryOutcome::Skipped {
                webhook_id: webhook.id(),
                reason: DeliverySkipReason::Inactive(webhook.status()),
            });
        }

        if !webhook.subscribes_to(event_type) {
            return Ok(DeliveryOutcome::Skipped {
                webhook_id: webhook.id(),
                reason: DeliverySkipReason::NotSubscribed,
            });
        }

        self.repository
            .mark_triggered(tenant_id, webhook.id(), Utc::now())
            .await?;

        let outcome = self
            .send_with_retry(tenant_id, webhook, event_type, &data)
            .await?;

        match &outcome {
            DeliveryOutcome::Delivered { .. } => {
                self.repository
                    .record_delivery_success(tenant_id, webhook.id(), Utc::now())
                    .await?;
            }
            DeliveryOutcome::Failed { error, .. } => {
                let health = self
                    .repository
                    .record_delivery_failure(
                        tenant_id,
                        webhook.id(),
                        error.as_str(),
                        self.policy.failure_threshold,
                    )
                    .await?;

                if health.status == WebhookStatus::Failed {
                    warn!(
                        tenant_id = %tenant_id,
                        webhook_id = %webhook.id(),
                        failure_count = health.failure_count,
                        "webhook disabled after reaching failure threshold"
                    );
                }
            }
            DeliveryOutcome::Interrupted { .. } | DeliveryOutcome::Skipped { .. } => {}
        }

        Ok(outcome)
    }

    /// Fans one event out to every active webhook subscribed to it.
    ///
    /// Deliveries run concurrently; attempts within one delivery stay sequential.
    pub async fn deliver_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
        data: Value,
    ) -> AppResult<Vec<DeliveryOutcome>> {
        let webhooks = self
            .repository
            .list_active_webhooks_for_event(tenant_id, event_type)
            .await?;

        let mut deliveries = JoinSet::new();
        for webhook in webhooks {
            let service = self.clone();
            let event_type = event_type.to_owned();
            let data = data.clone();
            deliveries.spawn(async move {
                service
                    .deliver(tenant_id, &webhook, event_type.as_str(), data)
                    .await
            });
        }

        let mut outcomes = Vec::with_capacity(deliveries.len());
        while let Some(joined) = deliveries.join_next().await {
            let outcome = joined.map_err(|error| {
                AppError::Internal(format!("webhook delivery task failed: {error}"))
            })??;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    pub(super) async fn send_with_retry(
        &self,
        tenant_id: TenantId,
        webhook: &Webhook,
        event_type: &str,
        data: &Value,
    ) -> AppResult<DeliveryOutcome> {
        let delivery_id = DeliveryId::new();
        let payload = serde_json::to_value(WebhookEnvelope {
            event: event_type,
            timestamp: Utc::now(),
            tenant_id,
            data,
            metadata: EnvelopeMetadata {
                webhook_id: webhook.id(),
                delivery_id,
            },
        })
        .map_err(|error| {
            AppError::Internal(format!("failed to serialize webhook payload: {error}"))
        })?;
        let body = payload.to_string();

        let strategy = webhook.retry_strategy();
        let timeout = Duration::from_millis(strategy.timeout_ms);
        let mut attempts = 0;
        let mut last_error = String::new();

        for attempt_number in 1..=strategy.max_attempts {
            if attempt_number > 1 {
                let status = self
                    .repository
                    .find_webhook(tenant_id, webhook.id())
                    .await?
                    .map(|current| current.status());
                if status != Some(WebhookStatus::Active) {
                    info!(
                        tenant_id = %tenant_id,
                        webhook_id = %webhook.id(),
                        delivery_id = %delivery_id,
                        attempts,
                        status = status.map_or("deleted", |status| status.as_str()),
                        "webhook no longer active, remaining attempts cancelled"
                    );
                    return Ok(DeliveryOutcome::Interrupted {
                        webhook_id: webhook.id(),
                        delivery_id,
                        attempts,
                        status,
                        error: last_error,
                    });
                }
            }

            attempts = attempt_number;
            let signed_at = Utc::now().timestamp();
            let signature =
                webhook_signature::sign(body.as_str(), webhook.secret().expose(), signed_at)
                    .map_err(|error| {
                        AppError::Internal(format!("failed to sign webhook payload: {error}"))
                    })?;

            let request = WebhookHttpRequest {
                url: webhook.url().to_string(),
                headers: request_headers(
                    webhook,
                    event_type,
                    delivery_id,
                    attempt_number,
                    signed_at,
                    signature,
                ),
                body: body.clone(),
                timeout,
            };

            let started = Instant::now();
            let response = tokio::time::timeout(timeout, self.http_client.post(request)).await;
            let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (response_status, response_body, error) = match response {
                Ok(Ok(response)) => {
                    let error = (!(200..300).contains(&response.status))
                        .then(|| format!("endpoint responded with HTTP {}", response.status));
                    (
                        Some(response.status),
                        Some(truncate(response.body.as_str())),
                        error,
                    )
                }
                Ok(Err(error)) => (None, None, Some(error.to_string())),
                Err(_) => (
                    None,
                    None,
                    Some(format!("request timed out after {}ms", strategy.timeout_ms)),
                ),
            };

            self.repository
                .append_delivery_attempt(
                    tenant_id,
                    WebhookDeliveryAttempt {
                        id: DeliveryAttemptId::new(),
                        delivery_id,
                        webhook_id: webhook.id(),
                        event_type: event_type.to_owned(),
                        payload: payload.clone(),
                        response_status,
                        response_body,
                        response_time_ms,
                        error: error.clone(),
                        attempt_number,
                        delivered_at: Utc::now(),
                    },
                )
                .await?;

            let Some(error) = error else {
                info!(
                    tenant_id = %tenant_id,
                    webhook_id = %webhook.id(),
                    delivery_id = %delivery_id,
                    event_type,
                    attempt = attempt_number,
                    "webhook delivered"
                );
                return Ok(DeliveryOutcome::Delivered {
                    webhook_id: webhook.id(),
                    delivery_id,
                    attempts: attempt_number,
                    response_status: response_status.unwrap_or_default(),
                });
            };

            warn!(
                tenant_id = %tenant_id,
                webhook_id = %webhook.id(),
                delivery_id = %delivery_id,
                event_type,
                attempt = attempt_number,
                max_attempts = strategy.max_attempts,
                error = %error,
                "webhook delivery attempt failed"
            );
            last_error = error;

            if self.policy.fail_fast_on_client_error && response_status.is_some_and(is_permanent) {
                break;
            }

            if attempt_number < strategy.max_attempts {
                tokio::time::sleep(backoff_delay(
                    strategy.backoff,
                    attempt_number,
                    self.policy.backoff_base,
                    self.policy.backoff_max,
                ))
                .await;
            }
        }

        Ok(DeliveryOutcome::Failed {
            webhook_id: webhook.id(),
            delivery_id,
            attempts,
            error: last_error,
        })
    }
}

fn request_headers(
    webhook: &Webhook,
    event_type: &str,
    delivery_id: DeliveryId,
    attempt_number: u16,
    signed_at: i64,
    signature: String,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = webhook
        .headers()
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("user-agent"))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    headers.extend([
        ("Content-Type".to_owned(), "application/json".to_owned()),
        ("User-Agent".to_owned(), USER_AGENT.to_owned()),
        (HEADER_EVENT.to_owned(), event_type.to_owned()),
        (HEADER_DELIVERY.to_owned(), delivery_id.to_string()),
        (HEADER_ATTEMPT.to_owned(), attempt_number.to_string()),
        (HEADER_TIMESTAMP.to_owned(), signed_at.to_string()),
        (HEADER_SIGNATURE.to_owned(), signature),
    ]);

    headers
}

/// 4xx responses that retrying cannot fix.
fn is_permanent(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_RESPONSE_BODY_CHARS).collect()
}
