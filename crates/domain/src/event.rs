use fieldflow_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::TagId;
use crate::workflow::{TriggerScope, TriggerType};

/// Domain event emitted by the CRUD layer for a watched entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    /// Tenant owning the entity.
    pub tenant_id: TenantId,
    /// Entity kind.
    pub scope: TriggerScope,
    /// Event category.
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    /// Tag involved in tag events.
    #[serde(default)]
    pub tag_id: Option<TagId>,
    /// Identifier of the entity inside its own subsystem.
    pub entity_id: String,
    /// Entity state after the mutation.
    pub entity_snapshot: Value,
}

impl EntityEvent {
    /// Validates the event envelope before evaluation.
    pub fn validate(&self) -> AppResult<()> {
        if self.entity_id.trim().is_empty() {
            return Err(AppError::Validation(
                "entity event requires a non-empty entity_id".to_owned(),
            ));
        }

        if !self.entity_snapshot.is_object() {
            return Err(AppError::Validation(
                "entity event snapshot must be a JSON object".to_owned(),
            ));
        }

        if self.tag_id.is_some() && !self.trigger_type.is_tag_trigger() {
            return Err(AppError::Validation(format!(
                "tag_id is only valid on tag events, got '{}'",
                self.trigger_type.as_str()
            )));
        }

        Ok(())
    }
}
