use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use fieldflow_application::{
    CreateWebhookInput, DeliveryOutcome, DeliverySkipReason, RotatedWebhookSecret,
    WebhookDeliveryAttempt, WebhookDeliveryListQuery,
};
use fieldflow_domain::{
    DeliveryAttemptId, DeliveryId, RetryStrategy, Webhook, WebhookId, WebhookStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming payload for webhook creation.
#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub events: BTreeSet<String>,
    pub secret: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub retry_strategy: Option<RetryStrategy>,
}

impl From<CreateWebhookRequest> for CreateWebhookInput {
    fn from(value: CreateWebhookRequest) -> Self {
        Self {
            name: value.name,
            url: value.url,
            description: value.description,
            events: value.events,
            secret: value.secret,
            headers: value.headers,
            retry_strategy: value.retry_strategy,
        }
    }
}

/// Optional replacement key for secret rotation; a key is generated when absent.
#[derive(Debug, Default, Deserialize)]
pub struct RotateWebhookSecretRequest {
    pub secret: Option<String>,
}

/// Webhook response. The signing secret is only returned on create and rotate.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub id: WebhookId,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub events: BTreeSet<String>,
    pub headers: BTreeMap<String, String>,
    pub status: WebhookStatus,
    pub retry_strategy: RetryStrategy,
    pub failure_count: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<Webhook> for WebhookResponse {
    fn from(value: Webhook) -> Self {
        Self {
            id: value.id(),
            name: value.name().as_str().to_owned(),
            url: value.url().to_string(),
            description: value.description().map(str::to_owned),
            events: value.events().clone(),
            headers: value.headers().clone(),
            status: value.status(),
            retry_strategy: value.retry_strategy(),
            failure_count: value.failure_count(),
            last_triggered_at: value.last_triggered_at(),
            last_success_at: value.last_success_at(),
            last_error: value.last_error().map(str::to_owned),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookWithSecretResponse {
    pub webhook: WebhookResponse,
    pub secret: String,
}

impl From<Webhook> for WebhookWithSecretResponse {
    fn from(value: Webhook) -> Self {
        let secret = value.secret().expose().to_owned();
        Self {
            webhook: WebhookResponse::from(value),
            secret,
        }
    }
}

impl From<RotatedWebhookSecret> for WebhookWithSecretResponse {
    fn from(value: RotatedWebhookSecret) -> Self {
        Self {
            webhook: WebhookResponse::from(value.webhook),
            secret: value.secret.expose().to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcomeResponse {
    Delivered {
        webhook_id: WebhookId,
        delivery_id: DeliveryId,
        attempts: u16,
        response_status: u16,
    },
    Failed {
        webhook_id: WebhookId,
        delivery_id: DeliveryId,
        attempts: u16,
        error: String,
    },
    Interrupted {
        webhook_id: WebhookId,
        delivery_id: DeliveryId,
        attempts: u16,
        status: String,
        error: String,
    },
    Skipped {
        webhook_id: WebhookId,
        reason: String,
    },
}

impl From<DeliveryOutcome> for DeliveryOutcomeResponse {
    fn from(value: DeliveryOutcome) -> Self {
        match value {
            DeliveryOutcome::Delivered {
                webhook_id,
                delivery_id,
                attempts,
                response_status,
            } => Self::Delivered {
                webhook_id,
                delivery_id,
                attempts,
                response_status,
            },
            DeliveryOutcome::Failed {
                webhook_id,
                delivery_id,
                attempts,
                error,
            } => Self::Failed {
                webhook_id,
                delivery_id,
                attempts,
                error,
            },
            DeliveryOutcome::Interrupted {
                webhook_id,
                delivery_id,
                attempts,
                status,
                error,
            } => Self::Interrupted {
                webhook_id,
                delivery_id,
                attempts,
                status: status.map_or("deleted", |status| status.as_str()).to_owned(),
                error,
            },
            DeliveryOutcome::Skipped { webhook_id, reason } => Self::Skipped {
                webhook_id,
                reason: match reason {
                    DeliverySkipReason::Inactive(status) => format!("webhook is {}", status.as_str()),
                    DeliverySkipReason::NotSubscribed => "event type not subscribed".to_owned(),
                },
            },
        }
    }
}

/// One recorded HTTP attempt.
#[derive(Debug, Serialize)]
pub struct DeliveryAttemptResponse {
    pub id: DeliveryAttemptId,
    pub delivery_id: DeliveryId,
    pub webhook_id: WebhookId,
    pub event_type: String,
    pub payload: Value,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub response_time_ms: u64,
    pub error: Option<String>,
    pub attempt_number: u16,
    pub delivered_at: DateTime<Utc>,
}

impl From<WebhookDeliveryAttempt> for DeliveryAttemptResponse {
    fn from(value: WebhookDeliveryAttempt) -> Self {
        Self {
            id: value.id,
            delivery_id: value.delivery_id,
            webhook_id: value.webhook_id,
            event_type: value.event_type,
            payload: value.payload,
            response_status: value.response_status,
            response_body: value.response_body,
            response_time_ms: value.response_time_ms,
            error: value.error,
            attempt_number: value.attempt_number,
            delivered_at: value.delivered_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeliveryListQueryRequest {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<DeliveryListQueryRequest> for WebhookDeliveryListQuery {
    fn from(value: DeliveryListQueryRequest) -> Self {
        let defaults = WebhookDeliveryListQuery::default();
        Self {
            limit: value.limit.unwrap_or(defaults.limit),
            offset: value.offset.unwrap_or(defaults.offset),
        }
    }
}
