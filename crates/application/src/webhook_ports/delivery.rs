use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldflow_domain::{
    DeliveryAttemptId, DeliveryId, RetryStrategy, Webhook, WebhookId, WebhookSecret,
    WebhookStatus,
};
use serde_json::Value;

/// Tenant-independent delivery parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Consecutive failed deliveries that flip a webhook to `failed`.
    pub failure_threshold: u32,
    /// Delay after the first failed attempt.
    pub backoff_base: Duration,
    /// Upper bound for any single backoff delay.
    pub backoff_max: Duration,
    /// Stop retrying on 4xx responses other than 408 and 429.
    pub fail_fast_on_client_error: bool,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            fail_fast_on_client_error: false,
        }
    }
}

/// One recorded HTTP attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookDeliveryAttempt {
    /// Attempt record identifier.
    pub id: DeliveryAttemptId,
    /// Logical delivery shared by every attempt.
    pub delivery_id: DeliveryId,
    /// Target webhook.
    pub webhook_id: WebhookId,
    /// Event type delivered.
    pub event_type: String,
    /// Wire payload sent.
    pub payload: Value,
    /// HTTP status, `None` when no response arrived.
    pub response_status: Option<u16>,
    /// Truncated response body.
    pub response_body: Option<String>,
    /// Wall-clock time spent on the attempt.
    pub response_time_ms: u64,
    /// Failure cause.
    pub error: Option<String>,
    /// 1-based attempt sequence.
    pub attempt_number: u16,
    /// Attempt completion timestamp.
    pub delivered_at: DateTime<Utc>,
}

impl WebhookDeliveryAttempt {
    /// Returns whether the attempt received a 2xx response.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.response_status
            .is_some_and(|status| (200..300).contains(&status))
    }
}

/// Query for the delivery log of one webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookDeliveryListQuery {
    /// Page size.
    pub limit: usize,
    /// Row offset.
    pub offset: usize,
}

impl Default for WebhookDeliveryListQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Why a delivery was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySkipReason {
    /// Webhook is paused or failed.
    Inactive(WebhookStatus),
    /// Webhook does not subscribe to the event type.
    NotSubscribed,
}

/// Result of one logical delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// A 2xx response ended the retry loop.
    Delivered {
        /// Target webhook.
        webhook_id: WebhookId,
        /// Logical delivery id.
        delivery_id: DeliveryId,
        /// Attempts spent.
        attempts: u16,
        /// Final HTTP status.
        response_status: u16,
    },
    /// Every attempt failed.
    Failed {
        /// Target webhook.
        webhook_id: WebhookId,
        /// Logical delivery id.
        delivery_id: DeliveryId,
        /// Attempts spent.
        attempts: u16,
        /// Last failure cause.
        error: String,
    },
    /// Retries stopped because the webhook left `active` mid-delivery.
    ///
    /// Health is left to whoever changed the status.
    Interrupted {
        /// Target webhook.
        webhook_id: WebhookId,
        /// Logical delivery id.
        delivery_id: DeliveryId,
        /// Attempts spent before the stop.
        attempts: u16,
        /// Status seen before the next retry, `None` once deleted.
        status: Option<WebhookStatus>,
        /// Last failure cause.
        error: String,
    },
    /// Nothing was sent.
    Skipped {
        /// Target webhook.
        webhook_id: WebhookId,
        /// Skip cause.
        reason: DeliverySkipReason,
    },
}

impl DeliveryOutcome {
    /// Returns whether the endpoint acknowledged the delivery.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Returns the target webhook.
    #[must_use]
    pub fn webhook_id(&self) -> WebhookId {
        match self {
            Self::Delivered { webhook_id, .. }
            | Self::Failed { webhook_id, .. }
            | Self::Interrupted { webhook_id, .. }
            | Self::Skipped { webhook_id, .. } => *webhook_id,
        }
    }

    /// Returns a failure description for anything but a successful delivery.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Delivered { .. } => None,
            Self::Failed {
                webhook_id,
                attempts,
                error,
                ..
            } => Some(format!(
                "webhook {webhook_id} failed after {attempts} attempt(s): {error}"
            )),
            Self::Interrupted {
                webhook_id,
                attempts,
                status,
                error,
                ..
            } => Some(format!(
                "webhook {webhook_id} became {} after {attempts} attempt(s): {error}",
                status.map_or("deleted", |status| status.as_str())
            )),
            Self::Skipped { webhook_id, reason } => Some(match reason {
                DeliverySkipReason::Inactive(status) => {
                    format!("webhook {webhook_id} skipped: status is {}", status.as_str())
                }
                DeliverySkipReason::NotSubscribed => {
                    format!("webhook {webhook_id} skipped: event type not subscribed")
                }
            }),
        }
    }
}

/// Webhook creation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateWebhookInput {
    /// User-facing name.
    pub name: String,
    /// Absolute http(s) endpoint.
    pub url: String,
    /// Optional description.
    pub description: Option<String>,
    /// Subscribed event types.
    pub events: BTreeSet<String>,
    /// Signing key, generated when absent.
    pub secret: Option<String>,
    /// Static extra headers.
    pub headers: BTreeMap<String, String>,
    /// Retry configuration, defaults apply when absent.
    pub retry_strategy: Option<RetryStrategy>,
}

/// Webhook returned together with its freshly issued secret.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedWebhookSecret {
    /// Updated webhook.
    pub webhook: Webhook,
    /// New signing key, shown to the caller once.
    pub secret: WebhookSecret,
}
