use thiserror::Error;

/// Errors surfaced by the cryptographic primitives layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("key derivation exhausted its retry budget")]
    KeyDerivationFailed,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signature did not recover a valid public key: {0}")]
    RecoveryFailed(String),

    #[error("AEAD operation failed")]
    AeadFailed,

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("HKDF expansion failed")]
    HkdfFailed,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
