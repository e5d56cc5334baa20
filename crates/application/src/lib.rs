//! Application services and ports.

#![forbid(unsafe_code)]

mod webhook_ports;
mod webhook_service;
pub mod webhook_signature;
mod workflow_ports;
mod workflow_service;

#[cfg(test)]
mod test_support;

pub use webhook_ports::{
    CreateWebhookInput, DeliveryOutcome, DeliveryPolicy, DeliverySkipReason, RotatedWebhookSecret,
    WebhookDeliveryAttempt, WebhookDeliveryListQuery, WebhookHttpClient, WebhookHttpRequest,
    WebhookHttpResponse, WebhookRepository,
};
pub use webhook_service::{
    HEADER_ATTEMPT, HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    TEST_EVENT_TYPE, USER_AGENT, WebhookService, backoff_delay,
};
pub use webhook_signature::{InboundSignatureVerifier, SignatureError};
pub use workflow_ports::{
    ActionResult, ActionSideEffects, ClaimRunOutcome, CreateRunOutcome, CreateWorkflowRunInput,
    DueWorkflowRun, EntityReference, EventDispatchSummary, FinishWorkflowRunInput,
    WorkflowExecutionMode, WorkflowRepository, WorkflowRun, WorkflowRunListQuery,
};
pub use workflow_service::{RunSchedule, WorkflowService, run_outcome};
