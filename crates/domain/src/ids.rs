use std::fmt::{Display, Formatter};

use fieldflow_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses the identifier from its textual UUID form.
            pub fn parse(value: &str) -> AppResult<Self> {
                Uuid::parse_str(value.trim()).map(Self).map_err(|error| {
                    AppError::Validation(format!(concat!("invalid ", $label, " '{}': {}"), value, error))
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Tenant-scoped workflow identifier.
    WorkflowId,
    "workflow id"
);
uuid_identifier!(
    /// Identifier of one workflow run.
    WorkflowRunId,
    "workflow run id"
);
uuid_identifier!(
    /// Tenant-scoped webhook identifier.
    WebhookId,
    "webhook id"
);
uuid_identifier!(
    /// Identifier shared by every attempt of one logical webhook delivery.
    DeliveryId,
    "delivery id"
);
uuid_identifier!(
    /// Identifier of one recorded delivery attempt.
    DeliveryAttemptId,
    "delivery attempt id"
);
uuid_identifier!(
    /// Reference to a tag owned by the tagging subsystem.
    TagId,
    "tag id"
);
