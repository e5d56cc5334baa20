use super::*;
use fieldflow_domain::WebhookId;

use crate::webhook_ports::DeliveryOutcome;

impl WorkflowService {
    /// Executes one action; failures are captured in the result, never propagated.
    pub(super) async fn execute_action(
        &self,
        context: &RunContext<'_>,
        action: &WorkflowAction,
    ) -> ActionResult {
        let action_type = action.action_type();
        let entity = &context.entity;

        let result = match action {
            WorkflowAction::SendEmail { to, subject, body } => {
                let to = to.as_deref().map(|to| context.interpolate(to));
                let subject = context.interpolate(subject);
                let body = context.interpolate(body);
                self.bounded(self.side_effects.send_email(
                    entity,
                    to.as_deref(),
                    subject.as_str(),
                    body.as_str(),
                ))
                .await
            }
            WorkflowAction::SendSms { to, message } => {
                let to = to.as_deref().map(|to| context.interpolate(to));
                let message = context.interpolate(message);
                self.bounded(
                    self.side_effects
                        .send_sms(entity, to.as_deref(), message.as_str()),
                )
                .await
            }
            WorkflowAction::AssignTag { tag_id } => {
                self.bounded(self.side_effects.assign_tag(entity, *tag_id))
                    .await
            }
            WorkflowAction::RemoveTag { tag_id } => {
                self.bounded(self.side_effects.remove_tag(entity, *tag_id))
                    .await
            }
            WorkflowAction::UpdateStatus { status } => {
                let status = context.interpolate(status);
                self.bounded(self.side_effects.update_status(entity, status.as_str()))
                    .await
            }
            WorkflowAction::Webhook {
                webhook_id,
                event_type,
            } => {
                return self
                    .execute_webhook_action(context, *webhook_id, event_type.as_deref())
                    .await;
            }
        };

        match result {
            Ok(()) => ActionResult::ok(action_type),
            Err(error) => classify_error(action_type, error),
        }
    }

    async fn bounded(&self, side_effect: impl Future<Output = AppResult<()>>) -> AppResult<()> {
        tokio::time::timeout(self.action_timeout, side_effect)
            .await
            .map_err(|_| {
                AppError::Internal(format!(
                    "side effect timed out after {}ms",
                    self.action_timeout.as_millis()
                ))
            })?
    }

    async fn execute_webhook_action(
        &self,
        context: &RunContext<'_>,
        webhook_id: Option<WebhookId>,
        event_type: Option<&str>,
    ) -> ActionResult {
        const ACTION_TYPE: &str = "webhook";

        let tenant_id = context.entity.tenant_id;
        let event_type = event_type
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| context.workflow.default_event_type());
        let data = serde_json::json!({
            "entity_type": context.entity.entity_type.as_str(),
            "entity_id": context.entity.entity_id,
            "entity": context.run.trigger_payload,
            "workflow_id": context.workflow.id(),
            "run_id": context.run.id,
        });

        let outcomes = match webhook_id {
            Some(webhook_id) => {
                match self.webhook_service.load_webhook(tenant_id, webhook_id).await {
                    Ok(webhook) => self
                        .webhook_service
                        .deliver(tenant_id, &webhook, event_type.as_str(), data)
                        .await
                        .map(|outcome| vec![outcome]),
                    Err(error) => Err(error),
                }
            }
            None => {
                self.webhook_service
                    .deliver_event(tenant_id, event_type.as_str(), data)
                    .await
            }
        };

        let outcomes = match outcomes {
            Ok(outcomes) => outcomes,
            Err(error) => return classify_error(ACTION_TYPE, error),
        };

        if outcomes.is_empty() {
            return ActionResult::fatal(
                ACTION_TYPE,
                format!("no active webhook subscribes to '{event_type}'"),
            );
        }

        let failures: Vec<String> = outcomes
            .iter()
            .filter_map(DeliveryOutcome::failure_message)
            .collect();
        if failures.is_empty() {
            ActionResult::ok(ACTION_TYPE)
        } else {
            ActionResult::failed(ACTION_TYPE, failures.join("; "))
        }
    }
}

/// Missing references and invalid configuration are fatal; everything else is recoverable.
fn classify_error(action_type: &'static str, error: AppError) -> ActionResult {
    match error {
        AppError::NotFound(_) | AppError::Validation(_) => {
            ActionResult::fatal(action_type, error.to_string())
        }
        _ => ActionResult::failed(action_type, error.to_string()),
    }
}
