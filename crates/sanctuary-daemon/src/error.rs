//! Top-level daemon error: configuration, storage wiring, and the server's
//! own I/O, collapsed into one enum so `main` has a single `?` surface.

use thiserror::Error;

pub type DaemonResult<T> = Result<T, DaemonError>;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sanctuary_storage::StorageError),

    #[error("server error: {0}")]
    Server(String),
}

impl From<std::io::Error> for DaemonError {
    fn from(e: std::io::Error) -> Self {
        Self::Server(e.to_string())
    }
}
