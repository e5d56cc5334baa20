//! Tenant, identity and error primitives shared by every fieldflow crate.

#![forbid(unsafe_code)]

/// Caller identity resolved by the upstream auth layer.
pub mod actor;
mod error;
mod tenant;
mod text;

pub use actor::{Actor, ActorRole};
pub use error::{AppError, AppResult};
pub use tenant::TenantId;
pub use text::NonEmptyString;
