//! Shared domain types for Sanctuary: agents, snapshots, attestations, trust
//! scores, the outward-facing error taxonomy, and the external-collaborator
//! traits (object store, ledger) the core depends on but does not own.

#![deny(unsafe_code)]

mod agent;
mod attestation;
mod error;
mod external;
mod ids;
mod response;
mod snapshot;
mod trust;

pub use agent::{Agent, AgentStatus, AgentStatusSummary, MAX_GENESIS_DECLARATION_BYTES};
pub use attestation::{
    Attestation, AttestationNote, LedgerTxStatus, ResurrectionEvent, ATTESTATION_COOLDOWN_DAYS,
};
pub use error::ServiceError;
pub use external::{AttestationLedger, InMemoryLedger, InMemoryObjectStore, ObjectStore};
pub use ids::{ChallengeNonce, SnapshotId, StorageHandle, TxHandle};
pub use response::{IdentitySummary, ResurrectionManifest, SnapshotSummary};
pub use snapshot::{Snapshot, SnapshotMeta, UploadReceipt, MAX_SNAPSHOT_META_BYTES};
pub use trust::{SignalBreakdown, TrustLevel, TrustScore, TRUST_RAW_SCORE_CAP};

pub use sanctuary_crypto::Address;
