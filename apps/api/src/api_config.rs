use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use fieldflow_application::{DeliveryPolicy, WorkflowExecutionMode};
use fieldflow_application::webhook_signature::DEFAULT_SIGNATURE_TOLERANCE_SECONDS;
use fieldflow_core::AppError;
use tracing_subscriber::EnvFilter;

/// Backing store selected with `FIELDFLOW_STORAGE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub storage: StorageConfig,
    pub api_host: String,
    pub api_port: u16,
    pub workflow_execution_mode: WorkflowExecutionMode,
    pub inbound_webhook_secrets: Vec<String>,
    pub inbound_signature_tolerance_seconds: u64,
    pub delivery_policy: DeliveryPolicy,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let storage = match env::var("FIELDFLOW_STORAGE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .trim()
        {
            "postgres" => StorageConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            "memory" => StorageConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "FIELDFLOW_STORAGE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        if migrate_only && storage == StorageConfig::Memory {
            return Err(AppError::Validation(
                "migrate requires FIELDFLOW_STORAGE=postgres".to_owned(),
            ));
        }

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parse_env("API_PORT", 3001_u16)?;

        let workflow_execution_mode = WorkflowExecutionMode::parse(
            env::var("WORKFLOW_EXECUTION_MODE")
                .unwrap_or_else(|_| "inline".to_owned())
                .as_str(),
        )?;

        let inbound_webhook_secrets = env::var("INBOUND_WEBHOOK_SECRETS")
            .map(|value| parse_secret_list(value.as_str()))
            .unwrap_or_default();
        let inbound_signature_tolerance_seconds = parse_env(
            "INBOUND_SIGNATURE_TOLERANCE_SECONDS",
            DEFAULT_SIGNATURE_TOLERANCE_SECONDS,
        )?;

        Ok(Self {
            migrate_only,
            storage,
            api_host,
            api_port,
            workflow_execution_mode,
            inbound_webhook_secrets,
            inbound_signature_tolerance_seconds,
            delivery_policy: delivery_policy_from_env()?,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
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

/// Reads the delivery policy variables shared with the worker.
pub fn delivery_policy_from_env() -> Result<DeliveryPolicy, AppError> {
    let defaults = DeliveryPolicy::default();
    let backoff_base_ms = parse_env(
        "WEBHOOK_BACKOFF_BASE_MS",
        u64::try_from(defaults.backoff_base.as_millis()).unwrap_or(1_000),
    )?;
    let backoff_max_ms = parse_env(
        "WEBHOOK_BACKOFF_MAX_MS",
        u64::try_from(defaults.backoff_max.as_millis()).unwrap_or(60_000),
    )?;

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

fn parse_secret_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|secret| !secret.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        _ => Ok(default),
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
