use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, AppResult};

/// Partition key carried by every workflow, run, webhook and delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Generates a fresh tenant id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps a stored UUID.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a textual UUID, ignoring surrounding whitespace.
    pub fn parse(value: &str) -> AppResult<Self> {
        value.parse()
    }
}

impl FromStr for TenantId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid tenant id '{value}': {error}")))
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

#[cfg(test)]
mod tests {
    use super::TenantId;

    #[test]
    fn parse_accepts_display_output_and_padding() {
        let tenant_id = TenantId::new();
        let padded = format!("  {tenant_id} ");
        assert_eq!(TenantId::parse(padded.as_str()).ok(), Some(tenant_id));
    }

    #[test]
    fn parse_rejects_non_uuid_values() {
        assert!(TenantId::parse("tenant-1").is_err());
        assert!(TenantId::parse("").is_err());
    }
}
