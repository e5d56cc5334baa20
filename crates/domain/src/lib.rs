//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod condition;
mod event;
mod ids;
mod run_status;
mod webhook;
mod workflow;

pub use condition::{matches_condition, matches_conditions};
pub use event::EntityEvent;
pub use ids::{DeliveryAttemptId, DeliveryId, TagId, WebhookId, WorkflowId, WorkflowRunId};
pub use run_status::WorkflowRunStatus;
pub use webhook::{
    BackoffKind, RESERVED_HEADER_PREFIX, RetryStrategy, Webhook, WebhookHealth, WebhookInput,
    WebhookSecret, WebhookStatus,
};
pub use workflow::{
    ConditionNode, ConditionOperator, MAX_DELAY_MINUTES, TriggerScope, TriggerType, Workflow,
    WorkflowAction, WorkflowConditions, WorkflowInput, webhook_event_type,
};
