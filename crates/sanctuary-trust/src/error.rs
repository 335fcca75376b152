use thiserror::Error;

/// Errors from `attest` and trust-score recomputation (§4.6).
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("an agent cannot attest about itself")]
    SelfAttestation,

    #[error("an attestation from this pair exists inside the cooldown window")]
    CooldownActive,

    #[error("agent not found")]
    AgentNotFound,

    #[error("ledger submission failed: {0}")]
    Ledger(String),

    #[error(transparent)]
    Storage(#[from] sanctuary_storage::StorageError),
}
