use fieldflow_application::EventDispatchSummary;
use fieldflow_core::TenantId;
use fieldflow_domain::{EntityEvent, TagId, TriggerScope, TriggerType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::workflows::WorkflowRunResponse;

/// Entity change reported by the CRUD layer. The tenant comes from the caller identity.
#[derive(Debug, Deserialize)]
pub struct EntityEventRequest {
    pub scope: TriggerScope,
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub tag_id: Option<TagId>,
    pub entity_id: String,
    pub entity_snapshot: Value,
}

impl EntityEventRequest {
    pub fn into_event(self, tenant_id: TenantId) -> EntityEvent {
        EntityEvent {
            tenant_id,
            scope: self.scope,
            trigger_type: self.trigger_type,
            tag_id: self.tag_id,
            entity_id: self.entity_id,
            entity_snapshot: self.entity_snapshot,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventDispatchResponse {
    pub matched_workflows: usize,
    pub skipped_active: usize,
    pub runs: Vec<WorkflowRunResponse>,
}

impl From<EventDispatchSummary> for EventDispatchResponse {
    fn from(value: EventDispatchSummary) -> Self {
        Self {
            matched_workflows: value.matched_workflows,
            skipped_active: value.skipped_active,
            runs: value
                .runs
                .into_iter()
                .map(WorkflowRunResponse::from)
                .collect(),
        }
    }
}
