use chrono::{DateTime, Utc};
use fieldflow_core::{AppError, AppResult, TenantId};
use fieldflow_domain::{TriggerScope, WorkflowId, WorkflowRunId, WorkflowRunStatus};
use serde_json::Value;

/// Workflow execution mode used by application services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowExecutionMode {
    /// Execute immediate runs inside the request that produced them.
    Inline,
    /// Leave every run pending for worker runtimes.
    Queued,
}

impl WorkflowExecutionMode {
    /// Parses configuration value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "inline" => Ok(Self::Inline),
            "queued" => Ok(Self::Queued),
            _ => Err(AppError::Validation(format!(
                "unknown workflow execution mode '{value}', expected 'inline' or 'queued'"
            ))),
        }
    }
}

/// Persisted workflow run record.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    /// Stable run identifier.
    pub id: WorkflowRunId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Workflow that produced the run.
    pub workflow_id: WorkflowId,
    /// Entity kind of the triggering entity.
    pub trigger_entity_type: TriggerScope,
    /// Identifier of the triggering entity.
    pub trigger_entity_id: String,
    /// Entity snapshot captured when the run was created.
    pub trigger_payload: Value,
    /// Lifecycle state.
    pub status: WorkflowRunStatus,
    /// Human-readable failure cause or joined action errors.
    pub error: Option<String>,
    /// Earliest execution time.
    pub scheduled_for: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Claim timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal transition timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Run creation payload for repository implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateWorkflowRunInput {
    /// Workflow that matched.
    pub workflow_id: WorkflowId,
    /// Entity kind of the triggering entity.
    pub trigger_entity_type: TriggerScope,
    /// Identifier of the triggering entity.
    pub trigger_entity_id: String,
    /// Entity snapshot.
    pub trigger_payload: Value,
    /// Earliest execution time.
    pub scheduled_for: DateTime<Utc>,
}

/// Result of a run creation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateRunOutcome {
    /// A new pending run was inserted.
    Created(WorkflowRun),
    /// A pending or running run already exists for the same workflow and entity.
    AlreadyActive(WorkflowRun),
}

/// Result of a `pending → running` claim.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimRunOutcome {
    /// This caller owns the run.
    Claimed(WorkflowRun),
    /// Another executor moved the run first; carries the observed status.
    NotPending(WorkflowRunStatus),
}

/// Terminal transition payload for repository implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishWorkflowRunInput {
    /// Run identifier.
    pub run_id: WorkflowRunId,
    /// `Completed` or `Failed`.
    pub status: WorkflowRunStatus,
    /// Failure cause or joined action errors.
    pub error: Option<String>,
}

/// Workflow run listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRunListQuery {
    /// Optional workflow filter.
    pub workflow_id: Option<WorkflowId>,
    /// Optional status filter.
    pub status: Option<WorkflowRunStatus>,
    /// Optional triggering entity filter.
    pub trigger_entity_id: Option<String>,
    /// Page size.
    pub limit: usize,
    /// Row offset.
    pub offset: usize,
}

impl Default for WorkflowRunListQuery {
    fn default() -> Self {
        Self {
            workflow_id: None,
            status: None,
            trigger_entity_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Pending run reference returned by the scheduler scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWorkflowRun {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Run identifier.
    pub run_id: WorkflowRunId,
    /// Earliest execution time.
    pub scheduled_for: DateTime<Utc>,
}

/// Outcome of executing one action against the triggering entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Stable action type value.
    pub action_type: &'static str,
    /// Failure cause, `None` on success.
    pub error: Option<String>,
    /// Whether the failure is a non-recoverable configuration error.
    pub fatal: bool,
}

impl ActionResult {
    /// Successful action.
    #[must_use]
    pub fn ok(action_type: &'static str) -> Self {
        Self {
            action_type,
            error: None,
            fatal: false,
        }
    }

    /// Recoverable failure, recorded without failing the run.
    #[must_use]
    pub fn failed(action_type: &'static str, error: impl Into<String>) -> Self {
        Self {
            action_type,
            error: Some(error.into()),
            fatal: false,
        }
    }

    /// Non-recoverable failure that fails the run.
    #[must_use]
    pub fn fatal(action_type: &'static str, error: impl Into<String>) -> Self {
        Self {
            action_type,
            error: Some(error.into()),
            fatal: true,
        }
    }

    /// Returns whether the action succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one entity event dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDispatchSummary {
    /// Workflows that matched the event.
    pub matched_workflows: usize,
    /// Runs created for this event, in their latest known state.
    pub runs: Vec<WorkflowRun>,
    /// Matches skipped because a run was already active for the entity.
    pub skipped_active: usize,
}
