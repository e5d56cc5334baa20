//! Fieldflow scheduler runtime for delayed and queued workflow runs.

#![forbid(unsafe_code)]

mod scheduler;
mod worker_config;

use std::sync::Arc;

use fieldflow_application::{WebhookService, WorkflowExecutionMode, WorkflowService};
use fieldflow_core::{AppError, AppResult};
use fieldflow_infrastructure::{
    ConsoleActionSideEffects, PostgresWebhookRepository, PostgresWorkflowRepository,
    ReqwestWebhookHttpClient,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::scheduler::Scheduler;
use crate::worker_config::{WorkerConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str(), config.claim_limit).await?;
    let workflow_service = build_workflow_service(pool, &config)?;

    info!(
        worker_id = %config.worker_id,
        claim_limit = config.claim_limit,
        poll_interval_ms = config.poll_interval.as_millis(),
        lookahead_seconds = config.lookahead.as_secs(),
        stale_run_seconds = config.stale_run_after.as_secs(),
        "fieldflow-worker started"
    );

    Scheduler::new(
        workflow_service,
        config.worker_id.clone(),
        config.claim_limit,
        config.poll_interval,
        config.lookahead,
        config.stale_run_after,
    )
    .run(shutdown_signal())
    .await;

    info!(worker_id = %config.worker_id, "fieldflow-worker stopped");
    Ok(())
}

async fn connect_pool(database_url: &str, claim_limit: usize) -> AppResult<PgPool> {
    let max_connections = u32::try_from(claim_limit)
        .unwrap_or(u32::MAX)
        .saturating_add(2);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_workflow_service(pool: PgPool, config: &WorkerConfig) -> AppResult<WorkflowService> {
    let webhook_service = WebhookService::new(
        Arc::new(PostgresWebhookRepository::new(pool.clone())),
        Arc::new(ReqwestWebhookHttpClient::with_defaults()?),
    )
    .with_policy(config.delivery_policy);

    Ok(WorkflowService::new(
        Arc::new(PostgresWorkflowRepository::new(pool)),
        Arc::new(ConsoleActionSideEffects::new()),
        webhook_service,
        WorkflowExecutionMode::Queued,
    ))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
