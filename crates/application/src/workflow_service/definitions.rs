use super::*;

impl WorkflowService {
    /// Creates or replaces one workflow definition.
    ///
    /// The system flag is never taken from input; updates keep the stored value.
    pub async fn save_workflow(&self, actor: &Actor, input: WorkflowInput) -> AppResult<Workflow> {
        actor.require_manage()?;

        let is_system = match input.id {
            Some(workflow_id) => self
                .repository
                .find_workflow(actor.tenant_id(), workflow_id)
                .await?
                .is_some_and(|existing| existing.is_system()),
            None => false,
        };

        let workflow = Workflow::new(WorkflowInput { is_system, ..input })?;
        self.repository
            .save_workflow(actor.tenant_id(), workflow.clone())
            .await?;

        info!(
            tenant_id = %actor.tenant_id(),
            workflow_id = %workflow.id(),
            subject = actor.subject(),
            trigger = %workflow.default_event_type(),
            actions = workflow.actions().len(),
            "workflow saved"
        );
        Ok(workflow)
    }

    /// Lists workflow definitions.
    pub async fn list_workflows(&self, actor: &Actor) -> AppResult<Vec<Workflow>> {
        self.repository.list_workflows(actor.tenant_id()).await
    }

    /// Returns one workflow definition.
    pub async fn find_workflow(&self, actor: &Actor, workflow_id: WorkflowId) -> AppResult<Workflow> {
        self.load_workflow(actor.tenant_id(), workflow_id).await
    }

    /// Enables or disables one workflow.
    pub async fn set_workflow_active(
        &self,
        actor: &Actor,
        workflow_id: WorkflowId,
        is_active: bool,
    ) -> AppResult<Workflow> {
        actor.require_manage()?;

        let workflow = self
            .load_workflow(actor.tenant_id(), workflow_id)
            .await?
            .with_active(is_active);
        self.repository
            .save_workflow(actor.tenant_id(), workflow.clone())
            .await?;

        Ok(workflow)
    }

    /// Deletes one user-defined workflow. Run history is kept.
    pub async fn delete_workflow(&self, actor: &Actor, workflow_id: WorkflowId) -> AppResult<()> {
        actor.require_manage()?;

        let workflow = self.load_workflow(actor.tenant_id(), workflow_id).await?;
        if workflow.is_system() {
            return Err(AppError::Forbidden(format!(
                "workflow '{}' is built in and cannot be deleted",
                workflow.name().as_str()
            )));
        }

        if !self
            .repository
            .delete_workflow(actor.tenant_id(), workflow_id)
            .await?
        {
            return Err(workflow_not_found(actor.tenant_id(), workflow_id));
        }

        info!(
            tenant_id = %actor.tenant_id(),
            workflow_id = %workflow_id,
            subject = actor.subject(),
            "workflow deleted"
        );
        Ok(())
    }

    pub(super) async fn load_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> AppResult<Workflow> {
        self.repository
            .find_workflow(tenant_id, workflow_id)
            .await?
            .ok_or_else(|| workflow_not_found(tenant_id, workflow_id))
    }
}

fn workflow_not_found(tenant_id: TenantId, workflow_id: WorkflowId) -> AppError {
    AppError::NotFound(format!(
        "workflow '{workflow_id}' does not exist for tenant '{tenant_id}'"
    ))
}
