use thiserror::Error;

/// Errors from `challenge.create`/`challenge.verify` and bearer-token checks
/// (§4.3, §6).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("challenge missing")]
    ChallengeMissing,

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("challenge already consumed")]
    ChallengeConsumed,

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("bearer token invalid")]
    TokenInvalid,

    #[error("bearer token expired")]
    TokenExpired,

    #[error("token agent does not match the requested agent")]
    AgentMismatch,

    #[error(transparent)]
    Storage(#[from] sanctuary_storage::StorageError),
}
