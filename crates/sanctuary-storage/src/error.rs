use thiserror::Error;

/// Storage-layer errors. `sanctuary-api` maps these onto the outward-facing
/// `ServiceError` taxonomy (§7): `NotFound`/`Conflict` pass through mostly
/// as-is, `Backend` becomes `ExternalUnavailable` or `Internal` depending on
/// call site.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
