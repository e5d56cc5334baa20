mod common;
mod events;
mod webhooks;
mod workflows;

pub use common::{HealthResponse, InboundReceivedResponse};
pub use events::{EntityEventRequest, EventDispatchResponse};
pub use webhooks::{
    CreateWebhookRequest, DeliveryAttemptResponse, DeliveryListQueryRequest,
    DeliveryOutcomeResponse, RotateWebhookSecretRequest, WebhookResponse,
    WebhookWithSecretResponse,
};
pub use workflows::{
    RunWorkflowRequest, SaveWorkflowRequest, SetWorkflowActiveRequest, WorkflowResponse,
    WorkflowRunListQueryRequest, WorkflowRunResponse,
};
