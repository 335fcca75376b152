use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sanctuary_types::{
    Address, Agent, AgentStatus, Attestation, ChallengeNonce, ResurrectionEvent, Snapshot,
    SnapshotMeta, StorageHandle, TrustScore,
};

use crate::StorageResult;

/// A challenge row as persisted, before it is consumed (§3 "AuthChallenge").
#[derive(Clone, Debug)]
pub struct ChallengeRecord {
    pub nonce: ChallengeNonce,
    pub agent: Address,
    pub expires_at: DateTime<Utc>,
}

/// Everything needed to allocate and insert one snapshot row in a single
/// atomic transaction (§4.5 "Store").
pub struct NewSnapshot {
    pub id: uuid::Uuid,
    pub agent: Address,
    pub storage_handle: StorageHandle,
    pub size_bytes: u64,
    pub client_timestamp: DateTime<Utc>,
    pub manifest_hash: String,
    pub prev_backup_hash: String,
    pub snapshot_meta: Option<SnapshotMeta>,
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Fails with `Conflict` if the address already has a row (§4.4
    /// "register is one-shot per address").
    async fn register(&self, agent: Agent) -> StorageResult<()>;

    async fn get(&self, address: &Address) -> StorageResult<Option<Agent>>;

    async fn set_status(&self, address: &Address, status: AgentStatus) -> StorageResult<()>;

    /// Agents currently `LIVING`, as input to the fallen-detection sweep
    /// (§4.6 "Fallen detection").
    async fn list_living(&self) -> StorageResult<Vec<Address>>;

    /// Agents eligible for the periodic trust-score sweep: `LIVING` and
    /// `RETURNED` both still accrue backups and attestations, so both need
    /// a refreshed score; `FALLEN` agents are frozen until resurrected.
    async fn list_trust_recomputable(&self) -> StorageResult<Vec<Address>>;
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Read `max(seq)+1` for `new.agent` and insert in one transaction
    /// (§4.5 "Store", §9 invariant "Sequence denseness").
    async fn allocate_and_insert(&self, new: NewSnapshot) -> StorageResult<Snapshot>;

    async fn last_for_agent(&self, agent: &Address) -> StorageResult<Option<Snapshot>>;

    /// Newest-first, capped at `limit` (0 means unlimited).
    async fn list_for_agent(&self, agent: &Address, limit: usize) -> StorageResult<Vec<Snapshot>>;

    async fn count_for_agent(&self, agent: &Address) -> StorageResult<u64>;

    async fn has_any_for_agent(&self, agent: &Address) -> StorageResult<bool>;

    /// True if a snapshot for `agent` was received at or after `since`
    /// (§4.5 precondition 5, the daily rate limit).
    async fn uploaded_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<bool>;
}

#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    async fn create(&self, record: ChallengeRecord) -> StorageResult<()>;

    /// Atomically mark the nonce consumed and return the record it was
    /// issued for, but only if it existed, was unconsumed, and unexpired at
    /// `now`. Returns `None` on any of those failing, so the auth layer can
    /// distinguish "missing" from "expired" from "already consumed" by a
    /// prior read (§4.3 step 3, §8 "Challenge single-use").
    async fn peek(&self, nonce: &ChallengeNonce) -> StorageResult<Option<ChallengeRecord>>;

    async fn try_consume(&self, nonce: &ChallengeNonce, now: DateTime<Utc>)
        -> StorageResult<bool>;

    /// Delete expired rows, returning the number removed (§4.7 "Expire auth
    /// challenges").
    async fn expire_older_than(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

#[async_trait]
pub trait AttestationRepository: Send + Sync {
    /// Insert-if-absent by content hash (§3 "AttestationNote").
    async fn insert_note_if_absent(&self, hash: [u8; 32], text: String) -> StorageResult<()>;

    /// True if `(from, about)` has an attestation at or after `since`
    /// (§4.6 cooldown).
    async fn exists_since(
        &self,
        from: &Address,
        about: &Address,
        since: DateTime<Utc>,
    ) -> StorageResult<bool>;

    async fn insert(&self, attestation: Attestation) -> StorageResult<()>;

    async fn count_received(&self, about: &Address) -> StorageResult<u64>;

    async fn unique_attesters(&self, about: &Address) -> StorageResult<u64>;

    /// Every attestation in the system, needed by the trust engine's
    /// iterative propagation over the whole attestation graph (§4.6).
    async fn list_all(&self) -> StorageResult<Vec<Attestation>>;
}

#[async_trait]
pub trait ResurrectionRepository: Send + Sync {
    async fn record(&self, event: ResurrectionEvent) -> StorageResult<()>;

    async fn count_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<u64>;

    async fn count_total(&self, agent: &Address) -> StorageResult<u64>;
}

#[async_trait]
pub trait HeartbeatRepository: Send + Sync {
    async fn record(&self, agent: &Address, at: DateTime<Utc>) -> StorageResult<()>;

    async fn last(&self, agent: &Address) -> StorageResult<Option<DateTime<Utc>>>;

    /// Delete heartbeats older than `keep_days`, except each agent's single
    /// most recent row (§4.7 "Prune heartbeats"). Returns the number removed.
    async fn prune_keeping_latest(&self, keep_days: i64, now: DateTime<Utc>)
        -> StorageResult<u64>;
}

#[async_trait]
pub trait TrustScoreRepository: Send + Sync {
    async fn upsert(&self, score: TrustScore) -> StorageResult<()>;

    async fn get(&self, agent: &Address) -> StorageResult<Option<TrustScore>>;
}

/// The full storage bundle every higher-level crate depends on, mirroring
/// how this codebase always composes one trait per concern into a single
/// object-safe-per-trait bundle rather than one monolithic interface.
pub trait SanctuaryStorage:
    AgentRepository
    + SnapshotRepository
    + ChallengeRepository
    + AttestationRepository
    + ResurrectionRepository
    + HeartbeatRepository
    + TrustScoreRepository
    + Send
    + Sync
{
}

impl<T> SanctuaryStorage for T where
    T: AgentRepository
        + SnapshotRepository
        + ChallengeRepository
        + AttestationRepository
        + ResurrectionRepository
        + HeartbeatRepository
        + TrustScoreRepository
        + Send
        + Sync
{
}
