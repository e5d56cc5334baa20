use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, TenantId};

/// Role resolved by the upstream authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Tenant administrator allowed to manage automation.
    Admin,
    /// Regular tenant member with read access.
    Member,
    /// Internal runtime identity (event ingestion, scheduler, worker).
    System,
}

impl ActorRole {
    /// Returns stable role value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
            Self::System => "system",
        }
    }

    /// Parses a role value forwarded by the auth layer.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "system" => Ok(Self::System),
            other => Err(AppError::Unauthorized(format!("unknown actor role '{other}'"))),
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Authenticated caller scoped to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    subject: String,
    tenant_id: TenantId,
    role: ActorRole,
}

impl Actor {
    /// Creates an actor from identity data resolved upstream.
    #[must_use]
    pub fn new(subject: impl Into<String>, tenant_id: TenantId, role: ActorRole) -> Self {
        Self {
            subject: subject.into(),
            tenant_id,
            role,
        }
    }

    /// Creates the internal identity used by event-driven execution.
    #[must_use]
    pub fn system(subject: impl Into<String>, tenant_id: TenantId) -> Self {
        Self::new(subject, tenant_id, ActorRole::System)
    }

    /// Returns the stable subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the tenant the actor operates in.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the actor role.
    #[must_use]
    pub fn role(&self) -> ActorRole {
        self.role
    }

    /// Fails with `Forbidden` unless the actor may manage automation.
    pub fn require_manage(&self) -> AppResult<()> {
        match self.role {
            ActorRole::Admin | ActorRole::System => Ok(()),
            ActorRole::Member => Err(AppError::Forbidden(format!(
                "subject '{}' is not allowed to manage automation",
                self.subject
            ))),
        }
    }
}
