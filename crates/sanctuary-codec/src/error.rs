use thiserror::Error;

/// Errors from parsing or verifying a backup envelope. A malformed length
/// field or an out-of-range file count always produces `BackupCorrupted`,
/// never a panic or an unbounded allocation (§4.2 "Parsing").
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("backup corrupted: {0}")]
    BackupCorrupted(String),

    #[error("header signature did not recover the claimed agent")]
    SignatureInvalid,

    #[error("file count {0} exceeds the maximum of {1}")]
    FileCountExceeded(usize, usize),

    #[error("file {0} not found in envelope")]
    FileNotFound(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] sanctuary_crypto::CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
