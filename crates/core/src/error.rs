use thiserror::Error;

/// Result alias returned by every port and service.
pub type AppResult<T> = Result<T, AppError>;

/// Error categories understood by both binaries.
///
/// The HTTP layer maps each variant to one status code, so pick the variant
/// by how the caller should react rather than by where the failure happened.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected input or a broken domain rule.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing resource within the caller's tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// State changed underneath the request, e.g. a run is already active.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unknown caller or a signed payload that failed verification.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Known caller without the required role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Storage, transport or other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn display_prefixes_the_category() {
        let error = AppError::Conflict("run already active".to_owned());
        assert_eq!(error.to_string(), "conflict: run already active");
    }
}
