use std::sync::Arc;

use fieldflow_application::{
    ActionSideEffects, InboundSignatureVerifier, WebhookHttpClient, WebhookRepository,
    WebhookService, WorkflowRepository, WorkflowService,
};
use fieldflow_infrastructure::{
    ConsoleActionSideEffects, InMemoryWebhookRepository, InMemoryWorkflowRepository,
    PostgresWebhookRepository, PostgresWorkflowRepository,
};
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

/// Storage adapters selected at startup.
#[derive(Clone)]
pub struct RepositorySet {
    pub workflow_repository: Arc<dyn WorkflowRepository>,
    pub webhook_repository: Arc<dyn WebhookRepository>,
}

impl RepositorySet {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            workflow_repository: Arc::new(PostgresWorkflowRepository::new(pool.clone())),
            webhook_repository: Arc::new(PostgresWebhookRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            workflow_repository: Arc::new(InMemoryWorkflowRepository::new()),
            webhook_repository: Arc::new(InMemoryWebhookRepository::new()),
        }
    }
}

pub fn build_app_state(
    repositories: RepositorySet,
    config: &ApiConfig,
    http_client: Arc<dyn WebhookHttpClient>,
) -> AppState {
    let side_effects: Arc<dyn ActionSideEffects> = Arc::new(ConsoleActionSideEffects::new());
    let webhook_service = WebhookService::new(repositories.webhook_repository, http_client)
        .with_policy(config.delivery_policy);

    AppState {
        workflow_service: WorkflowService::new(
            repositories.workflow_repository,
            side_effects,
            webhook_service.clone(),
            config.workflow_execution_mode,
        ),
        webhook_service,
        inbound_verifier: InboundSignatureVerifier::new(
            config.inbound_webhook_secrets.clone(),
            config.inbound_signature_tolerance_seconds,
        ),
    }
}
