use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldflow_core::{Actor, AppError, AppResult, TenantId};
use fieldflow_domain::{
    DeliveryAttemptId, DeliveryId, Webhook, WebhookId, WebhookInput, WebhookSecret,
    WebhookStatus,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::webhook_ports::{
    CreateWebhookInput, DeliveryOutcome, DeliveryPolicy, DeliverySkipReason, RotatedWebhookSecret,
    WebhookDeliveryAttempt, WebhookDeliveryListQuery, WebhookHttpClient, WebhookHttpRequest,
    WebhookRepository,
};
use crate::webhook_signature;

mod backoff;
mod delivery;
mod management;

pub use backoff::backoff_delay;
pub use delivery::{
    HEADER_ATTEMPT, HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    TEST_EVENT_TYPE, USER_AGENT,
};

/// Webhook management and signed outbound delivery.
#[derive(Clone)]
pub struct WebhookService {
    repository: Arc<dyn WebhookRepository>,
    http_client: Arc<dyn WebhookHttpClient>,
    policy: DeliveryPolicy,
}

impl WebhookService {
    /// Creates a webhook service with the default delivery policy.
    #[must_use]
    pub fn new(
        repository: Arc<dyn WebhookRepository>,
        http_client: Arc<dyn WebhookHttpClient>,
    ) -> Self {
        Self {
            repository,
            http_client,
            policy: DeliveryPolicy::default(),
        }
    }

    /// Replaces the delivery policy.
    #[must_use]
    pub fn with_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the active delivery policy.
    #[must_use]
    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }
}
