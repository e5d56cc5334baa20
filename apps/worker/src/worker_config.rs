use std::env;
use std::str::FromStr;
use std::time::Duration;

use fieldflow_application::DeliveryPolicy;
use fieldflow_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub worker_id: String,
    pub claim_limit: usize,
    pub poll_interval: Duration,
    pub lookahead: Duration,
    pub stale_run_after: Duration,
    pub delivery_policy: DeliveryPolicy,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let worker_id = env::var("WORKER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let claim_limit = parse_env("WORKER_CLAIM_LIMIT", 10_usize)?;
        let poll_interval_ms = parse_env("WORKER_POLL_INTERVAL_MS", 5_000_u64)?;
        let lookahead_seconds = parse_env("WORKER_LOOKAHEAD_SECONDS", 60_u64)?;
        let stale_run_seconds = parse_env("WORKER_STALE_RUN_SECONDS", 900_u64)?;

        if claim_limit == 0 {
            return Err(AppError::Validation(
                "WORKER_CLAIM_LIMIT must be greater than zero".to_owned(),
            ));
        }

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "WORKER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if stale_run_seconds == 0 {
            return Err(AppError::Validation(
                "WORKER_STALE_RUN_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            worker_id,
            claim_limit,
            poll_interval: Duration::from_millis(poll_interval_ms),
            lookahead: Duration::from_secs(lookahead_seconds),
            stale_run_after: Duration::from_secs(stale_run_seconds),
            delivery_policy: delivery_policy_from_env()?,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn delivery_policy_from_env() -> AppResult<DeliveryPolicy> {
    let defaults = DeliveryPolicy::default();
    let backoff_base_ms = parse_env("WEBHOOK_BACKOFF_BASE_MS", 1_000_u64)?;
    let backoff_max_ms = parse_env("WEBHOOK_BACKOFF_MAX_MS", 60_000_u64)?;

    if backoff_base_ms == 0 || backoff_max_ms < backoff_base_ms {
        return Err(AppError::Validation(
            "WEBHOOK_BACKOFF_BASE_MS must be positive and not above WEBHOOK_BACKOFF_MAX_MS"
                .to_owned(),
        ));
    }

    Ok(DeliveryPolicy {
        failure_threshold: parse_env("WEBHOOK_FAILURE_THRESHOLD", defaults.failure_threshold)?,
        backoff_base: Duration::from_millis(backoff_base_ms),
        backoff_max: Duration::from_millis(backoff_max_ms),
        fail_fast_on_client_error: env::var("WEBHOOK_FAIL_FAST_ON_CLIENT_ERROR")
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.fail_fast_on_client_error),
    })
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
