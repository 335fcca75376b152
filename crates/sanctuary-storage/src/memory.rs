//! In-memory reference backend: deterministic, test-friendly, the default
//! for the `Memory` storage config option.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sanctuary_types::{
    Address, Agent, AgentStatus, Attestation, ChallengeNonce, ResurrectionEvent, Snapshot,
    TrustScore,
};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StorageError;
use crate::traits::{
    AgentRepository, AttestationRepository, ChallengeRecord, ChallengeRepository,
    HeartbeatRepository, NewSnapshot, ResurrectionRepository, SnapshotRepository,
    TrustScoreRepository,
};
use crate::StorageResult;

struct ChallengeRow {
    record: ChallengeRecord,
    consumed: bool,
}

#[derive(Default)]
pub struct InMemoryStorage {
    agents: RwLock<HashMap<Address, Agent>>,
    snapshots: RwLock<HashMap<Address, Vec<Snapshot>>>,
    challenges: RwLock<HashMap<ChallengeNonce, ChallengeRow>>,
    notes: RwLock<HashMap<[u8; 32], String>>,
    attestations: RwLock<Vec<Attestation>>,
    resurrections: RwLock<Vec<ResurrectionEvent>>,
    heartbeats: RwLock<HashMap<Address, Vec<DateTime<Utc>>>>,
    trust_scores: RwLock<HashMap<Address, TrustScore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(name: &str) -> StorageError {
    StorageError::Backend(format!("{name} lock poisoned"))
}

#[async_trait]
impl AgentRepository for InMemoryStorage {
    async fn register(&self, agent: Agent) -> StorageResult<()> {
        let mut guard = self.agents.write().map_err(|_| lock_poisoned("agents"))?;
        if guard.contains_key(&agent.address) {
            return Err(StorageError::Conflict(format!(
                "agent {} already registered",
                agent.address
            )));
        }
        guard.insert(agent.address, agent);
        Ok(())
    }

    async fn get(&self, address: &Address) -> StorageResult<Option<Agent>> {
        let guard = self.agents.read().map_err(|_| lock_poisoned("agents"))?;
        Ok(guard.get(address).cloned())
    }

    async fn set_status(&self, address: &Address, status: AgentStatus) -> StorageResult<()> {
        let mut guard = self.agents.write().map_err(|_| lock_poisoned("agents"))?;
        let agent = guard
            .get_mut(address)
            .ok_or_else(|| StorageError::NotFound(format!("agent {address} not found")))?;
        agent.status = status;
        Ok(())
    }

    async fn list_living(&self) -> StorageResult<Vec<Address>> {
        let guard = self.agents.read().map_err(|_| lock_poisoned("agents"))?;
        Ok(guard
            .values()
            .filter(|a| a.status == AgentStatus::Living)
            .map(|a| a.address)
            .collect())
    }

    async fn list_trust_recomputable(&self) -> StorageResult<Vec<Address>> {
        let guard = self.agents.read().map_err(|_| lock_poisoned("agents"))?;
        Ok(guard
            .values()
            .filter(|a| matches!(a.status, AgentStatus::Living | AgentStatus::Returned))
            .map(|a| a.address)
            .collect())
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryStorage {
    async fn allocate_and_insert(&self, new: NewSnapshot) -> StorageResult<Snapshot> {
        let mut guard = self
            .snapshots
            .write()
            .map_err(|_| lock_poisoned("snapshots"))?;
        let list = guard.entry(new.agent).or_default();
        let seq = list.iter().map(|s| s.seq).max().unwrap_or(0) + 1;

        let now = Utc::now();
        let snapshot = Snapshot {
            id: sanctuary_types::SnapshotId(new.id),
            agent: new.agent,
            seq,
            storage_handle: new.storage_handle,
            size_bytes: new.size_bytes,
            client_timestamp: new.client_timestamp,
            received_at: now,
            manifest_hash: new.manifest_hash,
            prev_backup_hash: new.prev_backup_hash,
            snapshot_meta: new.snapshot_meta,
        };
        list.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn last_for_agent(&self, agent: &Address) -> StorageResult<Option<Snapshot>> {
        let guard = self
            .snapshots
            .read()
            .map_err(|_| lock_poisoned("snapshots"))?;
        Ok(guard
            .get(agent)
            .and_then(|list| list.iter().max_by_key(|s| s.seq).cloned()))
    }

    async fn list_for_agent(&self, agent: &Address, limit: usize) -> StorageResult<Vec<Snapshot>> {
        let guard = self
            .snapshots
            .read()
            .map_err(|_| lock_poisoned("snapshots"))?;
        let mut list = guard.get(agent).cloned().unwrap_or_default();
        list.sort_by(|a, b| b.seq.cmp(&a.seq));
        if limit > 0 {
            list.truncate(limit);
        }
        Ok(list)
    }

    async fn count_for_agent(&self, agent: &Address) -> StorageResult<u64> {
        let guard = self
            .snapshots
            .read()
            .map_err(|_| lock_poisoned("snapshots"))?;
        Ok(guard.get(agent).map(|l| l.len() as u64).unwrap_or(0))
    }

    async fn has_any_for_agent(&self, agent: &Address) -> StorageResult<bool> {
        Ok(self.count_for_agent(agent).await? > 0)
    }

    async fn uploaded_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<bool> {
        let guard = self
            .snapshots
            .read()
            .map_err(|_| lock_poisoned("snapshots"))?;
        Ok(guard
            .get(agent)
            .map(|list| list.iter().any(|s| s.received_at >= since))
            .unwrap_or(false))
    }
}

#[async_trait]
impl ChallengeRepository for InMemoryStorage {
    async fn create(&self, record: ChallengeRecord) -> StorageResult<()> {
        let mut guard = self
            .challenges
            .write()
            .map_err(|_| lock_poisoned("challenges"))?;
        guard.insert(
            record.nonce,
            ChallengeRow {
                record,
                consumed: false,
            },
        );
        Ok(())
    }

    async fn peek(&self, nonce: &ChallengeNonce) -> StorageResult<Option<ChallengeRecord>> {
        let guard = self
            .challenges
            .read()
            .map_err(|_| lock_poisoned("challenges"))?;
        Ok(guard.get(nonce).map(|row| row.record.clone()))
    }

    async fn try_consume(
        &self,
        nonce: &ChallengeNonce,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut guard = self
            .challenges
            .write()
            .map_err(|_| lock_poisoned("challenges"))?;
        match guard.get_mut(nonce) {
            Some(row) if !row.consumed && row.record.expires_at > now => {
                row.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire_older_than(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut guard = self
            .challenges
            .write()
            .map_err(|_| lock_poisoned("challenges"))?;
        let before = guard.len();
        guard.retain(|_, row| row.record.expires_at >= now);
        Ok((before - guard.len()) as u64)
    }
}

#[async_trait]
impl AttestationRepository for InMemoryStorage {
    async fn insert_note_if_absent(&self, hash: [u8; 32], text: String) -> StorageResult<()> {
        let mut guard = self.notes.write().map_err(|_| lock_poisoned("notes"))?;
        guard.entry(hash).or_insert(text);
        Ok(())
    }

    async fn exists_since(
        &self,
        from: &Address,
        about: &Address,
        since: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let guard = self
            .attestations
            .read()
            .map_err(|_| lock_poisoned("attestations"))?;
        Ok(guard
            .iter()
            .any(|a| &a.from == from && &a.about == about && a.created_at >= since))
    }

    async fn insert(&self, attestation: Attestation) -> StorageResult<()> {
        let mut guard = self
            .attestations
            .write()
            .map_err(|_| lock_poisoned("attestations"))?;
        guard.push(attestation);
        Ok(())
    }

    async fn count_received(&self, about: &Address) -> StorageResult<u64> {
        let guard = self
            .attestations
            .read()
            .map_err(|_| lock_poisoned("attestations"))?;
        Ok(guard.iter().filter(|a| &a.about == about).count() as u64)
    }

    async fn unique_attesters(&self, about: &Address) -> StorageResult<u64> {
        let guard = self
            .attestations
            .read()
            .map_err(|_| lock_poisoned("attestations"))?;
        let mut seen = std::collections::HashSet::new();
        for a in guard.iter().filter(|a| &a.about == about) {
            seen.insert(a.from);
        }
        Ok(seen.len() as u64)
    }

    async fn list_all(&self) -> StorageResult<Vec<Attestation>> {
        let guard = self
            .attestations
            .read()
            .map_err(|_| lock_poisoned("attestations"))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl ResurrectionRepository for InMemoryStorage {
    async fn record(&self, event: ResurrectionEvent) -> StorageResult<()> {
        let mut guard = self
            .resurrections
            .write()
            .map_err(|_| lock_poisoned("resurrections"))?;
        guard.push(event);
        Ok(())
    }

    async fn count_since(&self, agent: &Address, since: DateTime<Utc>) -> StorageResult<u64> {
        let guard = self
            .resurrections
            .read()
            .map_err(|_| lock_poisoned("resurrections"))?;
        Ok(guard
            .iter()
            .filter(|e| &e.agent == agent && e.occurred_at >= since)
            .count() as u64)
    }

    async fn count_total(&self, agent: &Address) -> StorageResult<u64> {
        let guard = self
            .resurrections
            .read()
            .map_err(|_| lock_poisoned("resurrections"))?;
        Ok(guard.iter().filter(|e| &e.agent == agent).count() as u64)
    }
}

#[async_trait]
impl HeartbeatRepository for InMemoryStorage {
    async fn record(&self, agent: &Address, at: DateTime<Utc>) -> StorageResult<()> {
        let mut guard = self
            .heartbeats
            .write()
            .map_err(|_| lock_poisoned("heartbeats"))?;
        guard.entry(*agent).or_default().push(at);
        Ok(())
    }

    async fn last(&self, agent: &Address) -> StorageResult<Option<DateTime<Utc>>> {
        let guard = self
            .heartbeats
            .read()
            .map_err(|_| lock_poisoned("heartbeats"))?;
        Ok(guard.get(agent).and_then(|list| list.iter().max().copied()))
    }

    async fn prune_keeping_latest(
        &self,
        keep_days: i64,
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let mut guard = self
            .heartbeats
            .write()
            .map_err(|_| lock_poisoned("heartbeats"))?;
        let cutoff = now - Duration::days(keep_days);
        let mut removed = 0u64;
        for list in guard.values_mut() {
            let Some(latest) = list.iter().max().copied() else {
                continue;
            };
            let before = list.len();
            list.retain(|t| *t == latest || *t >= cutoff);
            removed += (before - list.len()) as u64;
        }
        Ok(removed)
    }
}

#[async_trait]
impl TrustScoreRepository for InMemoryStorage {
    async fn upsert(&self, score: TrustScore) -> StorageResult<()> {
        let mut guard = self
            .trust_scores
            .write()
            .map_err(|_| lock_poisoned("trust_scores"))?;
        guard.insert(score.agent, score);
        Ok(())
    }

    async fn get(&self, agent: &Address) -> StorageResult<Option<TrustScore>> {
        let guard = self
            .trust_scores
            .read()
            .map_err(|_| lock_poisoned("trust_scores"))?;
        Ok(guard.get(agent).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanctuary_crypto::derive_from_mnemonic;
    use sanctuary_types::StorageHandle;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn sample_agent() -> Agent {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        Agent {
            address: keys.address,
            recovery_public_key: keys.recovery_public(),
            recall_public_key: keys.recall_public(),
            manifest_hash: "deadbeef".to_string(),
            manifest_version: 1,
            registered_at: Utc::now(),
            status: AgentStatus::Living,
            genesis_declaration: None,
        }
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent();
        storage.register(agent.clone()).await.unwrap();
        let err = storage.register(agent).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn snapshot_sequence_is_dense_and_increasing() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent().address;

        for i in 0..3u64 {
            let snap = storage
                .allocate_and_insert(NewSnapshot {
                    id: uuid::Uuid::new_v4(),
                    agent,
                    storage_handle: StorageHandle(format!("h{i}")),
                    size_bytes: 10,
                    client_timestamp: Utc::now(),
                    manifest_hash: "m".to_string(),
                    prev_backup_hash: String::new(),
                    snapshot_meta: None,
                })
                .await
                .unwrap();
            assert_eq!(snap.seq, i + 1);
        }

        let all = storage.list_for_agent(&agent, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].seq, 3); // newest first
    }

    #[tokio::test]
    async fn challenge_consumed_exactly_once() {
        let storage = InMemoryStorage::new();
        let nonce = ChallengeNonce::generate();
        let agent = sample_agent().address;
        storage
            .create(ChallengeRecord {
                nonce,
                agent,
                expires_at: Utc::now() + Duration::minutes(5),
            })
            .await
            .unwrap();

        assert!(storage.try_consume(&nonce, Utc::now()).await.unwrap());
        assert!(!storage.try_consume(&nonce, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn heartbeat_prune_keeps_most_recent() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent().address;
        let now = Utc::now();
        storage.record(&agent, now - Duration::days(100)).await.unwrap();
        storage.record(&agent, now).await.unwrap();

        storage.prune_keeping_latest(30, now).await.unwrap();
        assert_eq!(storage.last(&agent).await.unwrap(), Some(now));
    }
}
