use fieldflow_application::{InboundSignatureVerifier, WebhookService, WorkflowService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: WorkflowService,
    pub webhook_service: WebhookService,
    pub inbound_verifier: InboundSignatureVerifier,
}
