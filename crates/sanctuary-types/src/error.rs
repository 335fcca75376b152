use thiserror::Error;

/// The outward-facing error taxonomy of §7. Every inner crate's error type
/// maps onto exactly one of these kinds at the `sanctuary-api` boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("authentication invalid: {0}")]
    AuthInvalid(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("external service unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("corrupted: {0}")]
    Corrupted(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// A short machine-stable kind name, useful for metrics/log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => "InvalidInput",
            ServiceError::AuthRequired => "AuthRequired",
            ServiceError::AuthInvalid(_) => "AuthInvalid",
            ServiceError::Forbidden(_) => "Forbidden",
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::Conflict(_) => "Conflict",
            ServiceError::ExternalUnavailable(_) => "ExternalUnavailable",
            ServiceError::Corrupted(_) => "Corrupted",
            ServiceError::Internal(_) => "Internal",
        }
    }
}
