use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fieldflow_core::{Actor, AppError, AppResult, TenantId};
use fieldflow_domain::{
    EntityEvent, Workflow, WorkflowAction, WorkflowId, WorkflowInput, WorkflowRunId,
    WorkflowRunStatus, matches_conditions,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::webhook_service::WebhookService;
use crate::workflow_ports::{
    ActionResult, ActionSideEffects, ClaimRunOutcome, CreateRunOutcome, CreateWorkflowRunInput,
    DueWorkflowRun, EntityReference, EventDispatchSummary, FinishWorkflowRunInput,
    WorkflowExecutionMode, WorkflowRepository, WorkflowRun, WorkflowRunListQuery,
};

mod definitions;
mod execution;
mod ledger;
mod schedule;
mod trigger;

pub use execution::run_outcome;
pub use schedule::RunSchedule;

/// Workflow automation service: definitions, trigger evaluation, run ledger and execution.
#[derive(Clone)]
pub struct WorkflowService {
    repository: Arc<dyn WorkflowRepository>,
    side_effects: Arc<dyn ActionSideEffects>,
    webhook_service: WebhookService,
    execution_mode: WorkflowExecutionMode,
    action_timeout: Duration,
}

impl WorkflowService {
    /// Creates a workflow service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn WorkflowRepository>,
        side_effects: Arc<dyn ActionSideEffects>,
        webhook_service: WebhookService,
        execution_mode: WorkflowExecutionMode,
    ) -> Self {
        Self {
            repository,
            side_effects,
            webhook_service,
            execution_mode,
            action_timeout: Duration::from_secs(30),
        }
    }

    /// Bounds each email, SMS, tag and status side effect.
    #[must_use]
    pub fn with_action_timeout(mut self, action_timeout: Duration) -> Self {
        self.action_timeout = action_timeout;
        self
    }

    /// Returns configured execution mode.
    #[must_use]
    pub fn execution_mode(&self) -> WorkflowExecutionMode {
        self.execution_mode
    }
}
