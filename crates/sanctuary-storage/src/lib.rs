//! Persistence for every Sanctuary entity: agents, snapshots, auth
//! challenges, attestations, resurrection history, heartbeats and trust
//! scores (§6 "Persisted state layout").
//!
//! Two backends share one set of traits: [`memory::InMemoryStorage`] for
//! tests and single-node development, [`postgres::PostgresStorage`] for
//! production. Callers should depend on the traits in [`traits`], not on a
//! concrete backend, so a service can be built once and run against either.

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod shared;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;
pub use shared::SharedStorage;
pub use traits::{
    AgentRepository, AttestationRepository, ChallengeRecord, ChallengeRepository,
    HeartbeatRepository, NewSnapshot, ResurrectionRepository, SanctuaryStorage,
    SnapshotRepository, TrustScoreRepository,
};
