use fieldflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one workflow run.
///
/// `pending → running → {completed, failed}`; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    /// Created and waiting to be claimed.
    Pending,
    /// Claimed by exactly one executor.
    Running,
    /// Finished without a fatal action failure.
    Completed,
    /// Finished with a fatal failure or timed out.
    Failed,
}

impl WorkflowRunStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown workflow run status '{value}'"
            ))),
        }
    }

    /// Returns whether the run still occupies its (workflow, entity) slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Returns whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns whether `self → next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}
