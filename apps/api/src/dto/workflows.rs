use chrono::{DateTime, Utc};
use fieldflow_application::{WorkflowRun, WorkflowRunListQuery};
use fieldflow_core::AppError;
use fieldflow_domain::{
    TagId, TriggerScope, TriggerType, Workflow, WorkflowAction, WorkflowConditions, WorkflowId,
    WorkflowInput, WorkflowRunId, WorkflowRunStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming payload for workflow create/update.
#[derive(Debug, Deserialize)]
pub struct SaveWorkflowRequest {
    pub name: String,
    pub description: Option<String>,
    pub trigger_scope: TriggerScope,
    pub trigger_type: TriggerType,
    pub trigger_tag_id: Option<TagId>,
    #[serde(default)]
    pub conditions: WorkflowConditions,
    pub actions: Vec<WorkflowAction>,
    #[serde(default)]
    pub delay_minutes: u32,
    pub is_active: Option<bool>,
}

impl SaveWorkflowRequest {
    /// Builds service input; `id` is `Some` for updates.
    pub fn into_input(self, id: Option<WorkflowId>) -> WorkflowInput {
        WorkflowInput {
            id,
            name: self.name,
            description: self.description,
            trigger_scope: self.trigger_scope,
            trigger_type: self.trigger_type,
            trigger_tag_id: self.trigger_tag_id,
            conditions: self.conditions,
            actions: self.actions,
            delay_minutes: self.delay_minutes,
            is_active: self.is_active.unwrap_or(true),
            is_system: false,
        }
    }
}

/// Incoming payload for toggling a workflow.
#[derive(Debug, Deserialize)]
pub struct SetWorkflowActiveRequest {
    pub is_active: bool,
}

/// Incoming payload for a manual run against one entity.
#[derive(Debug, Deserialize)]
pub struct RunWorkflowRequest {
    pub entity_id: String,
    #[serde(default = "empty_object")]
    pub entity_snapshot: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Workflow definition response.
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: WorkflowId,
    pub name: String,
    pub description: Option<String>,
    pub trigger_scope: TriggerScope,
    pub trigger_type: TriggerType,
    pub trigger_tag_id: Option<TagId>,
    pub conditions: WorkflowConditions,
    pub actions: Vec<WorkflowAction>,
    pub delay_minutes: u32,
    pub is_active: bool,
    pub is_system: bool,
}

impl From<Workflow> for WorkflowResponse {
    fn from(value: Workflow) -> Self {
        Self {
            id: value.id(),
            name: value.name().as_str().to_owned(),
            description: value.description().map(str::to_owned),
            trigger_scope: value.trigger_scope(),
            trigger_type: value.trigger_type(),
            trigger_tag_id: value.trigger_tag_id(),
            conditions: value.conditions().clone(),
            actions: value.actions().to_vec(),
            delay_minutes: value.delay_minutes(),
            is_active: value.is_active(),
            is_system: value.is_system(),
        }
    }
}

/// Run ledger entry response.
#[derive(Debug, Serialize)]
pub struct WorkflowRunResponse {
    pub id: WorkflowRunId,
    pub workflow_id: WorkflowId,
    pub trigger_entity_type: TriggerScope,
    pub trigger_entity_id: String,
    pub trigger_payload: Value,
    pub status: WorkflowRunStatus,
    pub error: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<WorkflowRun> for WorkflowRunResponse {
    fn from(value: WorkflowRun) -> Self {
        Self {
            id: value.id,
            workflow_id: value.workflow_id,
            trigger_entity_type: value.trigger_entity_type,
            trigger_entity_id: value.trigger_entity_id,
            trigger_payload: value.trigger_payload,
            status: value.status,
            error: value.error,
            scheduled_for: value.scheduled_for,
            created_at: value.created_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowRunListQueryRequest {
    pub workflow_id: Option<String>,
    pub status: Option<String>,
    pub entity_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl TryFrom<WorkflowRunListQueryRequest> for WorkflowRunListQuery {
    type Error = AppError;

    fn try_from(value: WorkflowRunListQueryRequest) -> Result<Self, Self::Error> {
        let defaults = WorkflowRunListQuery::default();

        Ok(Self {
            workflow_id: value
                .workflow_id
                .as_deref()
                .map(WorkflowId::parse)
                .transpose()?,
            status: value
                .status
                .as_deref()
                .map(WorkflowRunStatus::parse)
                .transpose()?,
            trigger_entity_id: value.entity_id.filter(|entity_id| !entity_id.trim().is_empty()),
            limit: value.limit.unwrap_or(defaults.limit),
            offset: value.offset.unwrap_or(defaults.offset),
        })
    }
}
