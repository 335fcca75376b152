use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sanctuary_types::{
    Address, Agent, AgentStatus, Attestation, Snapshot, TrustScore,
};
use std::sync::Arc;

use crate::traits::{
    AgentRepository, AttestationRepository, ChallengeRecord, ChallengeRepository,
    HeartbeatRepository, NewSnapshot, ResurrectionRepository, SanctuaryStorage,
    SnapshotRepository, TrustScoreRepository,
};
use crate::StorageResult;
use sanctuary_types::ChallengeNonce;

/// A cheaply-cloneable handle to any [`SanctuaryStorage`] backend, so the
/// scheduler, the auth/registry/snapshot/trust services, and the api layer
/// can all hold the same storage without each being generic over a concrete
/// backend type.
#[derive(Clone)]
pub struct SharedStorage(Arc<dyn SanctuaryStorage>);

impl SharedStorage {
    pub fn new(backend: impl SanctuaryStorage + 'static) -> Self {
        Self(Arc::new(backend))
    }
}

#[async_trait]
impl AgentRepository for SharedStorage {
    async fn register(&self, agent: Agent) -> StorageResult<()> {
        self.0.register(agent).await
    }
    async fn get(&self, address: &Address) -> StorageResult<Option<Agent>> {
        AgentRepository::get(&*self.0, address).await
    }
    async fn set_status(&self, address: &Address, status: AgentStatus) -> StorageResult<()> {
        self.0.set_status(address, status).await
    }
    async fn list_living(&self) -> StorageResult<Vec<Address>> {
        self.0.list_living().await
    }
    async fn list_trust_recomputable(&self) -> StorageResult<Vec<Address>> {
        self.0.list_trust_recomputable().await
    }
}

#[async_trait]
impl SnapshotRepository for SharedStorage {
    async fn allocate_and_insert(&self, new: NewSnapshot) -> StorageResult<Snapshot> {
        self.0.allocate_and_insert(new).await
    }
    async fn last_for_agent(&self, agent: &Address) -> StorageResult<Option<Snapshot>> {
        self.0.last_for_agent(agent).await
    }
    async fn list_for_agent(&self, agent: &Address, limit: usize) -> StorageResult<Vec<Snapshot>> {
        self.0.list_for_agent(agent, limit).await
    }
    async fn count_for_agent(&self, agent: &Address) -> StorageResult<u64> {
        self.0.count_for_agent(agent).await
    }
    async fn has_any_for_agent(&self, agent: &Address) -> StorageResult<bool> {
        self.0.has_any_for_agent(agent).await
    }
    async fn uploaded_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<bool> {
        self.0.uploaded_since(agent, since).await
    }
}

#[async_trait]
impl ChallengeRepository for SharedStorage {
    async fn create(&self, record: ChallengeRecord) -> StorageResult<()> {
        self.0.create(record).await
    }
    async fn peek(&self, nonce: &ChallengeNonce) -> StorageResult<Option<ChallengeRecord>> {
        self.0.peek(nonce).await
    }
    async fn try_consume(&self, nonce: &ChallengeNonce, now: DateTime<Utc>) -> StorageResult<bool> {
        self.0.try_consume(nonce, now).await
    }
    async fn expire_older_than(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        self.0.expire_older_than(now).await
    }
}

#[async_trait]
impl AttestationRepository for SharedStorage {
    async fn insert_note_if_absent(&self, hash: [u8; 32], text: String) -> StorageResult<()> {
        self.0.insert_note_if_absent(hash, text).await
    }
    async fn exists_since(
        &self,
        from: &Address,
        about: &Address,
        since: DateTime<Utc>,
    ) -> StorageResult<bool> {
        self.0.exists_since(from, about, since).await
    }
    async fn insert(&self, attestation: Attestation) -> StorageResult<()> {
        self.0.insert(attestation).await
    }
    async fn count_received(&self, about: &Address) -> StorageResult<u64> {
        self.0.count_received(about).await
    }
    async fn unique_attesters(&self, about: &Address) -> StorageResult<u64> {
        self.0.unique_attesters(about).await
    }
    async fn list_all(&self) -> StorageResult<Vec<Attestation>> {
        self.0.list_all().await
    }
}

#[async_trait]
impl ResurrectionRepository for SharedStorage {
    async fn record(&self, event: sanctuary_types::ResurrectionEvent) -> StorageResult<()> {
        ResurrectionRepository::record(&*self.0, event).await
    }
    async fn count_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<u64> {
        self.0.count_since(agent, since).await
    }
    async fn count_total(&self, agent: &Address) -> StorageResult<u64> {
        self.0.count_total(agent).await
    }
}

#[async_trait]
impl HeartbeatRepository for SharedStorage {
    async fn record(&self, agent: &Address, at: DateTime<Utc>) -> StorageResult<()> {
        HeartbeatRepository::record(&*self.0, agent, at).await
    }
    async fn last(&self, agent: &Address) -> StorageResult<Option<DateTime<Utc>>> {
        self.0.last(agent).await
    }
    async fn prune_keeping_latest(&self, keep_days: i64, now: DateTime<Utc>) -> StorageResult<u64> {
        self.0.prune_keeping_latest(keep_days, now).await
    }
}

#[async_trait]
impl TrustScoreRepository for SharedStorage {
    async fn upsert(&self, score: TrustScore) -> StorageResult<()> {
        self.0.upsert(score).await
    }
    async fn get(&self, agent: &Address) -> StorageResult<Option<TrustScore>> {
        TrustScoreRepository::get(&*self.0, agent).await
    }
}
