use thiserror::Error;

/// Errors from `agent.register` and `agent.resurrect` (§4.4, §6).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent already registered")]
    AgentExists,

    #[error("registration deadline has passed")]
    DeadlineExpired,

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("genesis declaration exceeds {0} bytes")]
    GenesisTooLong(usize),

    #[error("agent not found")]
    NotFound,

    #[error("agent is not currently fallen")]
    NotFallen,

    #[error("resurrection rate limit exceeded")]
    ResurrectionRateLimited,

    #[error(transparent)]
    Storage(#[from] sanctuary_storage::StorageError),
}
