//! Fieldflow API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use fieldflow_core::AppError;
use fieldflow_infrastructure::ReqwestWebhookHttpClient;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StorageConfig, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{RepositorySet, build_app_state, connect_and_migrate};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let repositories = match &config.storage {
        StorageConfig::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }
            RepositorySet::postgres(pool)
        }
        StorageConfig::Memory => {
            warn!("FIELDFLOW_STORAGE=memory, workflows and webhooks are not persisted");
            RepositorySet::in_memory()
        }
    };

    let http_client = Arc::new(ReqwestWebhookHttpClient::with_defaults()?);
    let app_state = build_app_state(repositories, &config, http_client);
    if !app_state.inbound_verifier.is_configured() {
        info!("INBOUND_WEBHOOK_SECRETS not set, inbound payment callbacks are disabled");
    }

    let app = build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(
        %address,
        execution_mode = ?config.workflow_execution_mode,
        "fieldflow api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("server error: {error}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
