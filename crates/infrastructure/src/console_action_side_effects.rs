//! Console side-effect provider for development. Logs every action to tracing output.

use async_trait::async_trait;
use fieldflow_application::{ActionSideEffects, EntityReference};
use fieldflow_core::AppResult;
use fieldflow_domain::TagId;
use tracing::info;

/// Development provider that logs workflow side effects instead of performing them.
#[derive(Debug, Clone, Default)]
pub struct ConsoleActionSideEffects;

impl ConsoleActionSideEffects {
    /// Creates a new console provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionSideEffects for ConsoleActionSideEffects {
    async fn send_email(
        &self,
        entity: &EntityReference,
        to: Option<&str>,
        subject: &str,
        body: &str,
    ) -> AppResult<()> {
        let to = to.unwrap_or("<entity contact>");
        info!(
            tenant_id = %entity.tenant_id,
            entity_type = entity.entity_type.as_str(),
            entity_id = entity.entity_id.as_str(),
            to,
            subject,
            "--- EMAIL (console) ---\nTo: {to}\nSubject: {subject}\n\n{body}\n--- END EMAIL ---"
        );

        Ok(())
    }

    async fn send_sms(
        &self,
        entity: &EntityReference,
        to: Option<&str>,
        message: &str,
    ) -> AppResult<()> {
        info!(
            tenant_id = %entity.tenant_id,
            entity_id = entity.entity_id.as_str(),
            to = to.unwrap_or("<entity contact>"),
            "--- SMS (console) --- {message}"
        );

        Ok(())
    }

    async fn assign_tag(&self, entity: &EntityReference, tag_id: TagId) -> AppResult<()> {
        info!(
            tenant_id = %entity.tenant_id,
            entity_type = entity.entity_type.as_str(),
            entity_id = entity.entity_id.as_str(),
            tag_id = %tag_id,
            "tag assigned (console)"
        );

        Ok(())
    }

    async fn remove_tag(&self, entity: &EntityReference, tag_id: TagId) -> AppResult<()> {
        info!(
            tenant_id = %entity.tenant_id,
            entity_type = entity.entity_type.as_str(),
            entity_id = entity.entity_id.as_str(),
            tag_id = %tag_id,
            "tag removed (console)"
        );

        Ok(())
    }

    async fn update_status(&self, entity: &EntityReference, status: &str) -> AppResult<()> {
        info!(
            tenant_id = %entity.tenant_id,
            entity_type = entity.entity_type.as_str(),
            entity_id = entity.entity_id.as_str(),
            status,
            "entity status updated (console)"
        );

        Ok(())
    }
}
