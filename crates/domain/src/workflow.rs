use std::collections::BTreeMap;

use fieldflow_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{TagId, WebhookId, WorkflowId};

/// Longest supported execution delay (30 days).
pub const MAX_DELAY_MINUTES: u32 = 43_200;

/// Entity kind a workflow listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerScope {
    /// Field-service job.
    Job,
    /// Site inspection.
    Inspection,
    /// Customer record.
    Client,
    /// Sales lead.
    Lead,
    /// Customer invoice.
    Invoice,
}

impl TriggerScope {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Inspection => "inspection",
            Self::Client => "client",
            Self::Lead => "lead",
            Self::Invoice => "invoice",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "job" => Ok(Self::Job),
            "inspection" => Ok(Self::Inspection),
            "client" => Ok(Self::Client),
            "lead" => Ok(Self::Lead),
            "invoice" => Ok(Self::Invoice),
            _ => Err(AppError::Validation(format!(
                "unknown workflow trigger scope '{value}'"
            ))),
        }
    }
}

/// Event category a workflow reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Entity status field changed.
    StatusChanged,
    /// Tag attached to the entity.
    TagAdded,
    /// Tag detached from the entity.
    TagRemoved,
    /// Entity created.
    Created,
    /// Entity updated.
    Updated,
}

impl TriggerType {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusChanged => "status_changed",
            Self::TagAdded => "tag_added",
            Self::TagRemoved => "tag_removed",
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "status_changed" => Ok(Self::StatusChanged),
            "tag_added" => Ok(Self::TagAdded),
            "tag_removed" => Ok(Self::TagRemoved),
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            _ => Err(AppError::Validation(format!(
                "unknown workflow trigger type '{value}'"
            ))),
        }
    }

    /// Returns whether events of this type carry a tag reference.
    #[must_use]
    pub fn is_tag_trigger(&self) -> bool {
        matches!(self, Self::TagAdded | Self::TagRemoved)
    }
}

/// Returns the webhook event type emitted for one trigger shape, e.g. `job.status_changed`.
#[must_use]
pub fn webhook_event_type(scope: TriggerScope, trigger_type: TriggerType) -> String {
    format!("{}.{}", scope.as_str(), trigger_type.as_str())
}

/// Comparison operator of one workflow condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Deep value equality.
    Equals,
    /// Deep value inequality.
    NotEquals,
    /// Substring or sequence membership.
    Contains,
    /// Numeric comparison, entity value above the configured value.
    GreaterThan,
    /// Numeric comparison, entity value below the configured value.
    LessThan,
}

/// One stored condition applied to a single entity field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionNode {
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Configured comparison value.
    #[serde(default)]
    pub value: Value,
}

impl ConditionNode {
    /// Creates a condition node.
    #[must_use]
    pub fn new(operator: ConditionOperator, value: Value) -> Self {
        Self { operator, value }
    }
}

/// Field name to condition map; every entry must hold for a match.
pub type WorkflowConditions = BTreeMap<String, ConditionNode>;

/// Declarative side effect executed by a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum WorkflowAction {
    /// Sends an email about the triggering entity.
    SendEmail {
        /// Explicit recipient; the provider resolves the entity contact when absent.
        #[serde(default)]
        to: Option<String>,
        /// Subject template.
        subject: String,
        /// Plain-text body template.
        body: String,
    },
    /// Sends a text message about the triggering entity.
    SendSms {
        /// Explicit recipient; the provider resolves the entity contact when absent.
        #[serde(default)]
        to: Option<String>,
        /// Message template.
        message: String,
    },
    /// Attaches a tag to the triggering entity.
    AssignTag {
        /// Tag reference.
        tag_id: TagId,
    },
    /// Detaches a tag from the triggering entity.
    RemoveTag {
        /// Tag reference.
        tag_id: TagId,
    },
    /// Moves the triggering entity to a new status.
    UpdateStatus {
        /// Target status value.
        status: String,
    },
    /// Delivers the triggering entity to subscribed webhooks.
    Webhook {
        /// Optional explicit target webhook.
        #[serde(default)]
        webhook_id: Option<WebhookId>,
        /// Optional event type override; defaults to `<scope>.<trigger_type>`.
        #[serde(default)]
        event_type: Option<String>,
    },
}

impl WorkflowAction {
    /// Returns stable action type value.
    #[must_use]
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::SendEmail { .. } => "send_email",
            Self::SendSms { .. } => "send_sms",
            Self::AssignTag { .. } => "assign_tag",
            Self::RemoveTag { .. } => "remove_tag",
            Self::UpdateStatus { .. } => "update_status",
            Self::Webhook { .. } => "webhook",
        }
    }
}

/// Tenant-scoped automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: NonEmptyString,
    description: Option<String>,
    trigger_scope: TriggerScope,
    trigger_type: TriggerType,
    trigger_tag_id: Option<TagId>,
    conditions: WorkflowConditions,
    actions: Vec<WorkflowAction>,
    delay_minutes: u32,
    is_active: bool,
    is_system: bool,
}

/// Input payload used to construct a validated workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowInput {
    /// Existing identifier when updating, `None` to allocate one.
    pub id: Option<WorkflowId>,
    /// User-facing name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Entity kind the rule listens to.
    pub trigger_scope: TriggerScope,
    /// Event category the rule listens to.
    pub trigger_type: TriggerType,
    /// Optional tag filter for tag triggers.
    pub trigger_tag_id: Option<TagId>,
    /// Conditions evaluated against the entity snapshot.
    pub conditions: WorkflowConditions,
    /// Ordered actions.
    pub actions: Vec<WorkflowAction>,
    /// Execution delay in minutes, 0 for immediate.
    pub delay_minutes: u32,
    /// Enabled/disabled flag.
    pub is_active: bool,
    /// Built-in workflow flag.
    pub is_system: bool,
}

impl Workflow {
    /// Creates a validated workflow.
    pub fn new(input: WorkflowInput) -> AppResult<Self> {
        let WorkflowInput {
            id,
            name,
            description,
            trigger_scope,
            trigger_type,
            trigger_tag_id,
            conditions,
            actions,
            delay_minutes,
            is_active,
            is_system,
        } = input;

        if trigger_tag_id.is_some() && !trigger_type.is_tag_trigger() {
            return Err(AppError::Validation(format!(
                "trigger_tag_id is only allowed for tag_added/tag_removed triggers, got '{}'",
                trigger_type.as_str()
            )));
        }

        if delay_minutes > MAX_DELAY_MINUTES {
            return Err(AppError::Validation(format!(
                "delay_minutes must be less than or equal to {MAX_DELAY_MINUTES}"
            )));
        }

        if actions.is_empty() {
            return Err(AppError::Validation(
                "workflow must define at least one action".to_owned(),
            ));
        }

        if conditions.keys().any(|field| field.trim().is_empty()) {
            return Err(AppError::Validation(
                "workflow condition field names must not be empty".to_owned(),
            ));
        }

        for action in &actions {
            validate_action(action)?;
        }

        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            id: id.unwrap_or_default(),
            name: NonEmptyString::new(name)?,
            description,
            trigger_scope,
            trigger_type,
            trigger_tag_id,
            conditions,
            actions,
            delay_minutes,
            is_active,
            is_system,
        })
    }

    /// Returns workflow identifier.
    #[must_use]
    pub fn id(&self) -> WorkflowId {
        self.id
    }

    /// Returns workflow name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the entity kind the rule listens to.
    #[must_use]
    pub fn trigger_scope(&self) -> TriggerScope {
        self.trigger_scope
    }

    /// Returns the event category the rule listens to.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    /// Returns the optional tag filter.
    #[must_use]
    pub fn trigger_tag_id(&self) -> Option<TagId> {
        self.trigger_tag_id
    }

    /// Returns stored conditions.
    #[must_use]
    pub fn conditions(&self) -> &WorkflowConditions {
        &self.conditions
    }

    /// Returns actions in declared order.
    #[must_use]
    pub fn actions(&self) -> &[WorkflowAction] {
        self.actions.as_slice()
    }

    /// Returns execution delay in minutes.
    #[must_use]
    pub fn delay_minutes(&self) -> u32 {
        self.delay_minutes
    }

    /// Returns whether the workflow can be matched.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns whether the workflow is built in.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Returns a copy with the active flag replaced.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns the webhook event type this workflow emits by default.
    #[must_use]
    pub fn default_event_type(&self) -> String {
        webhook_event_type(self.trigger_scope, self.trigger_type)
    }
}

fn validate_action(action: &WorkflowAction) -> AppResult<()> {
    match action {
        WorkflowAction::SendEmail { to, subject, body } => {
            validate_recipient(to.as_deref(), "send_email")?;
            if subject.trim().is_empty() || body.trim().is_empty() {
                return Err(AppError::Validation(
                    "send_email action requires a non-empty subject and body".to_owned(),
                ));
            }

            Ok(())
        }
        WorkflowAction::SendSms { to, message } => {
            validate_recipient(to.as_deref(), "send_sms")?;
            if message.trim().is_empty() {
                return Err(AppError::Validation(
                    "send_sms action requires a non-empty message".to_owned(),
                ));
            }

            Ok(())
        }
        WorkflowAction::AssignTag { .. } | WorkflowAction::RemoveTag { .. } => Ok(()),
        WorkflowAction::UpdateStatus { status } => {
            if status.trim().is_empty() {
                return Err(AppError::Validation(
                    "update_status action requires a non-empty status".to_owned(),
                ));
            }

            Ok(())
        }
        WorkflowAction::Webhook { event_type, .. } => {
            if let Some(event_type) = event_type
                && event_type.trim().is_empty()
            {
                return Err(AppError::Validation(
                    "webhook action event_type must not be empty when provided".to_owned(),
                ));
            }

            Ok(())
        }
    }
}

fn validate_recipient(to: Option<&str>, action_type: &str) -> AppResult<()> {
    if let Some(recipient) = to
        && recipient.trim().is_empty()
    {
        return Err(AppError::Validation(format!(
            "{action_type} action recipient must not be empty when provided"
        )));
    }

    Ok(())
}
