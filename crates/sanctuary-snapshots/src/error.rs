use thiserror::Error;

/// Errors from `snapshot.upload` (§4.5).
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("header agent does not match the authenticated agent")]
    AgentMismatch,

    #[error("header signature invalid")]
    SignatureInvalid,

    #[error("payload is empty")]
    PayloadEmpty,

    #[error("payload exceeds the maximum size of {0} bytes")]
    PayloadTooLarge(usize),

    #[error("agent status does not permit uploads")]
    AgentNotWritable,

    #[error("daily snapshot rate limit exceeded")]
    RateLimited,

    #[error("snapshot metadata exceeds {0} bytes")]
    MetaTooLarge(usize),

    #[error("agent not found")]
    AgentNotFound,

    #[error(transparent)]
    Codec(#[from] sanctuary_codec::CodecError),

    #[error(transparent)]
    Storage(#[from] sanctuary_storage::StorageError),

    #[error("object store unavailable: {0}")]
    ObjectStoreUnavailable(String),
}
