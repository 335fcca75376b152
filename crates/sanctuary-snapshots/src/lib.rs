//! The append-only snapshot store: the `snapshot.upload` contract (§4.5)
//! and the genesis / rate-limit bookkeeping around it.

mod error;
mod upload;

pub use error::SnapshotError;
pub use upload::{SnapshotService, MAX_PAYLOAD_BYTES};
