use async_trait::async_trait;
use fieldflow_core::{AppResult, TenantId};
use fieldflow_domain::{TagId, TriggerScope};

/// Triggering entity handed to side-effect providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReference {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Entity kind.
    pub entity_type: TriggerScope,
    /// Entity identifier.
    pub entity_id: String,
}

/// Port for side effects owned by other subsystems.
///
/// `AppError::NotFound` and `AppError::Validation` mark a configuration
/// problem and fail the run; other errors are recorded as recoverable.
#[async_trait]
pub trait ActionSideEffects: Send + Sync {
    /// Sends an email about the entity.
    async fn send_email(
        &self,
        entity: &EntityReference,
        to: Option<&str>,
        subject: &str,
        body: &str,
    ) -> AppResult<()>;

    /// Sends a text message about the entity.
    async fn send_sms(
        &self,
        entity: &EntityReference,
        to: Option<&str>,
        message: &str,
    ) -> AppResult<()>;

    /// Attaches a tag to the entity.
    async fn assign_tag(&self, entity: &EntityReference, tag_id: TagId) -> AppResult<()>;

    /// Detaches a tag from the entity.
    async fn remove_tag(&self, entity: &EntityReference, tag_id: TagId) -> AppResult<()>;

    /// Moves the entity to a new status.
    async fn update_status(&self, entity: &EntityReference, status: &str) -> AppResult<()>;
}
