use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Utc};
use fieldflow_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ids::WebhookId;

/// Header prefix reserved for signing and delivery metadata.
pub const RESERVED_HEADER_PREFIX: &str = "x-fieldflow-";

/// Delivery health state of one webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Deliveries are attempted.
    Active,
    /// Paused by the tenant.
    Paused,
    /// Halted after crossing the failure threshold.
    Failed,
}

impl WebhookStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown webhook status '{value}'"
            ))),
        }
    }
}

/// Delay growth between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Delay doubles after every failed attempt.
    Exponential,
    /// Constant delay between attempts.
    Fixed,
}

impl BackoffKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exponential => "exponential",
            Self::Fixed => "fixed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "exponential" => Ok(Self::Exponential),
            "fixed" => Ok(Self::Fixed),
            _ => Err(AppError::Validation(format!(
                "unknown webhook backoff '{value}'"
            ))),
        }
    }
}

/// Per-webhook retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Upper bound of attempts for one logical delivery.
    pub max_attempts: u16,
    /// Delay growth.
    pub backoff: BackoffKind,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl RetryStrategy {
    /// Largest accepted attempt count.
    pub const MAX_ATTEMPTS: u16 = 10;
    /// Largest accepted per-attempt timeout.
    pub const MAX_TIMEOUT_MS: u64 = 60_000;

    /// Validates strategy bounds.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_attempts == 0 || self.max_attempts > Self::MAX_ATTEMPTS {
            return Err(AppError::Validation(format!(
                "retry max_attempts must be between 1 and {}",
                Self::MAX_ATTEMPTS
            )));
        }

        if self.timeout_ms == 0 || self.timeout_ms > Self::MAX_TIMEOUT_MS {
            return Err(AppError::Validation(format!(
                "retry timeout_ms must be between 1 and {}",
                Self::MAX_TIMEOUT_MS
            )));
        }

        Ok(())
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            timeout_ms: 10_000,
        }
    }
}

/// HMAC signing key of one webhook. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Minimum accepted secret length.
    pub const MIN_LENGTH: usize = 16;

    /// Wraps a validated secret value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().len() < Self::MIN_LENGTH {
            return Err(AppError::Validation(format!(
                "webhook secret must be at least {} characters",
                Self::MIN_LENGTH
            )));
        }

        Ok(Self(value))
    }

    /// Returns the raw key material.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for WebhookSecret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("WebhookSecret(***)")
    }
}

/// Tenant-configured outbound HTTP subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Webhook {
    id: WebhookId,
    name: NonEmptyString,
    url: Url,
    description: Option<String>,
    events: BTreeSet<String>,
    secret: WebhookSecret,
    headers: BTreeMap<String, String>,
    status: WebhookStatus,
    retry_strategy: RetryStrategy,
    failure_count: u32,
    last_triggered_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Input payload used to construct a validated webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookInput {
    /// Existing identifier, `None` to allocate one.
    pub id: Option<WebhookId>,
    /// User-facing name.
    pub name: String,
    /// Absolute http(s) endpoint.
    pub url: String,
    /// Optional description.
    pub description: Option<String>,
    /// Subscribed event types.
    pub events: BTreeSet<String>,
    /// Signing key.
    pub secret: WebhookSecret,
    /// Static extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Retry configuration.
    pub retry_strategy: RetryStrategy,
}

/// Persisted health columns, used when rehydrating from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookHealth {
    /// Delivery status.
    pub status: WebhookStatus,
    /// Consecutive logical delivery failures.
    pub failure_count: u32,
    /// Last delivery start.
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Last successful delivery.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Last failure cause.
    pub last_error: Option<String>,
}

impl Default for WebhookHealth {
    fn default() -> Self {
        Self {
            status: WebhookStatus::Active,
            failure_count: 0,
            last_triggered_at: None,
            last_success_at: None,
            last_error: None,
        }
    }
}

impl Webhook {
    /// Creates a validated, active webhook.
    pub fn new(input: WebhookInput) -> AppResult<Self> {
        Self::restore(input, WebhookHealth::default())
    }

    /// Rebuilds a webhook with persisted health state.
    pub fn restore(input: WebhookInput, health: WebhookHealth) -> AppResult<Self> {
        let WebhookInput {
            id,
            name,
            url,
            description,
            events,
            secret,
            headers,
            retry_strategy,
        } = input;

        let url = Url::parse(url.trim()).map_err(|error| {
            AppError::Validation(format!("webhook url '{url}' is invalid: {error}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AppError::Validation(format!(
                "webhook url '{url}' must be an absolute http or https url"
            )));
        }

        let events: BTreeSet<String> = events
            .into_iter()
            .map(|event| event.trim().to_owned())
            .filter(|event| !event.is_empty())
            .collect();
        if events.is_empty() {
            return Err(AppError::Validation(
                "webhook must subscribe to at least one event".to_owned(),
            ));
        }

        for name in headers.keys() {
            validate_header_name(name)?;
        }

        retry_strategy.validate()?;

        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            id: id.unwrap_or_default(),
            name: NonEmptyString::new(name)?,
            url,
            description,
            events,
            secret,
            headers,
            status: health.status,
            retry_strategy,
            failure_count: health.failure_count,
            last_triggered_at: health.last_triggered_at,
            last_success_at: health.last_success_at,
            last_error: health.last_error,
        })
    }

    /// Returns webhook identifier.
    #[must_use]
    pub fn id(&self) -> WebhookId {
        self.id
    }

    /// Returns webhook name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the target endpoint.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns subscribed event types.
    #[must_use]
    pub fn events(&self) -> &BTreeSet<String> {
        &self.events
    }

    /// Returns the signing key.
    #[must_use]
    pub fn secret(&self) -> &WebhookSecret {
        &self.secret
    }

    /// Returns static extra headers.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns delivery status.
    #[must_use]
    pub fn status(&self) -> WebhookStatus {
        self.status
    }

    /// Returns retry configuration.
    #[must_use]
    pub fn retry_strategy(&self) -> RetryStrategy {
        self.retry_strategy
    }

    /// Returns consecutive failed logical deliveries.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Returns last delivery start.
    #[must_use]
    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    /// Returns last successful delivery.
    #[must_use]
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    /// Returns last failure cause.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the persisted health columns.
    #[must_use]
    pub fn health(&self) -> WebhookHealth {
        WebhookHealth {
            status: self.status,
            failure_count: self.failure_count,
            last_triggered_at: self.last_triggered_at,
            last_success_at: self.last_success_at,
            last_error: self.last_error.clone(),
        }
    }

    /// Returns whether the webhook subscribes to an event type.
    #[must_use]
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.events.contains(event_type)
    }

    /// Marks the start of a delivery.
    pub fn record_triggered(&mut self, at: DateTime<Utc>) {
        self.last_triggered_at = Some(at);
    }

    /// Applies a successful delivery.
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.failure_count = 0;
        self.last_success_at = Some(at);
        self.last_error = None;
    }

    /// Applies an exhausted delivery; flips to `Failed` once the count reaches `threshold`.
    pub fn record_failure(&mut self, error: impl Into<String>, threshold: u32) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_error = Some(error.into());
        if self.status == WebhookStatus::Active && self.failure_count >= threshold.max(1) {
            self.status = WebhookStatus::Failed;
        }
    }

    /// Pauses deliveries.
    pub fn pause(&mut self) {
        self.status = WebhookStatus::Paused;
    }

    /// Re-enables deliveries and clears the failure streak.
    pub fn reactivate(&mut self) {
        self.status = WebhookStatus::Active;
        self.failure_count = 0;
        self.last_error = None;
    }

    /// Replaces the signing key.
    pub fn rotate_secret(&mut self, secret: WebhookSecret) {
        self.secret = secret;
    }

    /// Overwrites health state with a stored copy, keeping the definition.
    pub fn restore_health(&mut self, health: WebhookHealth) {
        self.status = health.status;
        self.failure_count = health.failure_count;
        self.last_triggered_at = health.last_triggered_at;
        self.last_success_at = health.last_success_at;
        self.last_error = health.last_error;
    }
}

fn validate_header_name(name: &str) -> AppResult<()> {
    let is_token = !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte));
    if !is_token {
        return Err(AppError::Validation(format!(
            "webhook header name '{name}' is not a valid HTTP header name"
        )));
    }

    let lowercase = name.to_ascii_lowercase();
    if lowercase.starts_with(RESERVED_HEADER_PREFIX) || lowercase == "content-type" {
        return Err(AppError::Validation(format!(
            "webhook header '{name}' is reserved for delivery metadata"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Utc;

    use super::{
        BackoffKind, RetryStrategy, Webhook, WebhookInput, WebhookSecret, WebhookStatus,
    };

    fn secret() -> WebhookSecret {
        WebhookSecret::new("0123456789abcdef0123").unwrap_or_else(|_| unreachable!())
    }

    fn input() -> WebhookInput {
        WebhookInput {
            id: None,
            name: "Accounting sync".to_owned(),
            url: "https://hooks.example.com/jobs".to_owned(),
            description: None,
            events: BTreeSet::from(["job.status_changed".to_owned()]),
            secret: secret(),
            headers: BTreeMap::from([("X-Api-Key".to_owned(), "abc".to_owned())]),
            retry_strategy: RetryStrategy::default(),
        }
    }

    #[test]
    fn webhook_rejects_non_http_urls() {
        let webhook = Webhook::new(WebhookInput {
            url: "ftp://files.example.com".to_owned(),
            ..input()
        });

        assert!(webhook.is_err());
    }

    #[test]
    fn webhook_rejects_reserved_headers() {
        let webhook = Webhook::new(WebhookInput {
            headers: BTreeMap::from([("X-Fieldflow-Signature".to_owned(), "forged".to_owned())]),
            ..input()
        });

        assert!(webhook.is_err());
    }

    #[test]
    fn webhook_requires_events_and_bounded_retries() {
        let no_events = Webhook::new(WebhookInput {
            events: BTreeSet::from([" ".to_owned()]),
            ..input()
        });
        let too_many_attempts = Webhook::new(WebhookInput {
            retry_strategy: RetryStrategy {
                max_attempts: 11,
                backoff: BackoffKind::Fixed,
                timeout_ms: 1_000,
            },
            ..input()
        });

        assert!(no_events.is_err());
        assert!(too_many_attempts.is_err());
    }

    #[test]
    fn failures_trip_status_at_threshold_and_success_resets_count() {
        let webhook = Webhook::new(input());
        assert!(webhook.is_ok());
        let mut webhook = webhook.unwrap_or_else(|_| unreachable!());

        webhook.record_failure("HTTP 500", 2);
        assert_eq!(webhook.status(), WebhookStatus::Active);
        webhook.record_success(Utc::now());
        assert_eq!(webhook.failure_count(), 0);

        webhook.record_failure("HTTP 500", 2);
        webhook.record_failure("HTTP 502", 2);
        assert_eq!(webhook.status(), WebhookStatus::Failed);
        assert_eq!(webhook.last_error(), Some("HTTP 502"));

        webhook.reactivate();
        assert_eq!(webhook.status(), WebhookStatus::Active);
        assert_eq!(webhook.failure_count(), 0);
    }

    #[test]
    fn secret_debug_is_redacted() {
        assert_eq!(format!("{:?}", secret()), "WebhookSecret(***)");
        assert!(WebhookSecret::new("short").is_err());
    }
}
