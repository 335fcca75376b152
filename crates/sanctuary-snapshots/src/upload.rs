use chrono::{DateTime, Duration, Utc};
use sanctuary_codec::decode;
use sanctuary_crypto::Address;
use sanctuary_storage::{AgentRepository, NewSnapshot, SnapshotRepository};
use sanctuary_types::{
    Agent, AgentStatus, ObjectStore, Snapshot, SnapshotMeta, MAX_SNAPSHOT_META_BYTES,
};

use crate::error::SnapshotError;

/// Upper bound on an encoded backup envelope's size, checked against the
/// raw bytes before anything is decoded (§4.5 precondition 3).
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

/// `snapshot.upload` (§4.5), parameterised over whatever repositories and
/// object store a caller has assembled.
pub struct SnapshotService<S, O> {
    storage: S,
    objects: O,
}

impl<S, O> SnapshotService<S, O>
where
    S: AgentRepository + SnapshotRepository,
    O: ObjectStore,
{
    pub fn new(storage: S, objects: O) -> Self {
        Self { storage, objects }
    }

    /// `token_agent` is the address the bearer token was issued to; `bytes`
    /// is a complete encoded backup envelope as produced by
    /// `sanctuary_codec::encode`.
    pub async fn upload(
        &self,
        token_agent: &Address,
        bytes: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<Snapshot, SnapshotError> {
        if bytes.is_empty() {
            return Err(SnapshotError::PayloadEmpty);
        }
        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(SnapshotError::PayloadTooLarge(MAX_PAYLOAD_BYTES));
        }

        // `decode` verifies the header signature recovers to `header.agent`
        // as part of framing (§4.5 preconditions 1 and 2's second half).
        let envelope = decode(&bytes)?;
        if &envelope.header.agent != token_agent {
            return Err(SnapshotError::AgentMismatch);
        }

        let agent = self
            .storage
            .get(token_agent)
            .await
            .map_err(SnapshotError::Storage)?
            .ok_or(SnapshotError::AgentNotFound)?;
        if !agent_accepts_uploads(&agent) {
            return Err(SnapshotError::AgentNotWritable);
        }

        let since = now - Duration::hours(24);
        if self
            .storage
            .uploaded_since(token_agent, since)
            .await
            .map_err(SnapshotError::Storage)?
        {
            return Err(SnapshotError::RateLimited);
        }

        let has_prior = self
            .storage
            .has_any_for_agent(token_agent)
            .await
            .map_err(SnapshotError::Storage)?;
        let snapshot_meta = coerce_genesis(envelope.header.snapshot_meta.clone(), has_prior);

        if let Some(meta) = &snapshot_meta {
            let size = serde_json::to_vec(meta)
                .map_err(|e| SnapshotError::Codec(sanctuary_codec::CodecError::Serialization(
                    e.to_string(),
                )))?
                .len();
            if size > MAX_SNAPSHOT_META_BYTES {
                return Err(SnapshotError::MetaTooLarge(MAX_SNAPSHOT_META_BYTES));
            }
        }

        let size_bytes = bytes.len() as u64;
        let storage_handle = self
            .objects
            .put(bytes)
            .await
            .map_err(|e| SnapshotError::ObjectStoreUnavailable(e.to_string()))?;

        let client_timestamp = DateTime::from_timestamp_millis(envelope.header.timestamp)
            .unwrap_or(now);

        let new = NewSnapshot {
            id: envelope.header.backup_id.0,
            agent: *token_agent,
            storage_handle,
            size_bytes,
            client_timestamp,
            manifest_hash: envelope.header.manifest_hash.clone(),
            prev_backup_hash: envelope.header.prev_backup_hash.clone(),
            snapshot_meta,
        };

        self.storage
            .allocate_and_insert(new)
            .await
            .map_err(SnapshotError::Storage)
    }
}

fn agent_accepts_uploads(agent: &Agent) -> bool {
    matches!(agent.status, AgentStatus::Living | AgentStatus::Returned)
}

/// §4.5 precondition 6: a client claiming `genesis=true` is only honoured
/// the first time; any prior snapshot coerces it back to `false`.
fn coerce_genesis(meta: Option<SnapshotMeta>, has_prior: bool) -> Option<SnapshotMeta> {
    meta.map(|mut m| {
        if m.genesis && has_prior {
            m.genesis = false;
        }
        m
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanctuary_crypto::derive_from_mnemonic;
    use sanctuary_storage::memory::InMemoryStorage;
    use sanctuary_types::{InMemoryObjectStore, SnapshotId};
    use std::collections::HashMap;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn sample_agent(keys: &sanctuary_crypto::AgentKeys, status: AgentStatus) -> Agent {
        Agent {
            address: keys.address,
            recovery_public_key: keys.recovery_public(),
            recall_public_key: keys.recall_public(),
            manifest_hash: "m".to_string(),
            manifest_version: 1,
            registered_at: Utc::now(),
            status,
            genesis_declaration: None,
        }
    }

    fn envelope_bytes(
        keys: &sanctuary_crypto::AgentKeys,
        seq: u64,
        meta: Option<SnapshotMeta>,
    ) -> Vec<u8> {
        let mut files = HashMap::new();
        files.insert("soul.md".to_string(), b"hello".to_vec());
        sanctuary_codec::encode(
            &keys.agent_secret,
            keys.address,
            SnapshotId::generate(),
            seq,
            Utc::now().timestamp_millis(),
            "0".repeat(64),
            sanctuary_codec::manifest_hash(&["soul.md".to_string()]),
            &keys.recovery_public(),
            &keys.recall_public(),
            &[7u8; sanctuary_crypto::KEY_LEN],
            &files,
            meta,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn first_upload_is_accepted_and_sequenced() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let storage = InMemoryStorage::new();
        storage
            .register(sample_agent(&keys, AgentStatus::Living))
            .await
            .unwrap();
        let svc = SnapshotService::new(storage, InMemoryObjectStore::new());

        let bytes = envelope_bytes(&keys, 1, None);
        let snapshot = svc.upload(&keys.address, bytes, Utc::now()).await.unwrap();
        assert_eq!(snapshot.seq, 1);
    }

    #[tokio::test]
    async fn second_upload_same_day_is_rate_limited() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let storage = InMemoryStorage::new();
        storage
            .register(sample_agent(&keys, AgentStatus::Living))
            .await
            .unwrap();
        let svc = SnapshotService::new(storage, InMemoryObjectStore::new());

        let now = Utc::now();
        svc.upload(&keys.address, envelope_bytes(&keys, 1, None), now)
            .await
            .unwrap();
        let err = svc
            .upload(&keys.address, envelope_bytes(&keys, 2, None), now + Duration::hours(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::RateLimited));
    }

    #[tokio::test]
    async fn fallen_agent_cannot_upload() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let storage = InMemoryStorage::new();
        storage
            .register(sample_agent(&keys, AgentStatus::Fallen))
            .await
            .unwrap();
        let svc = SnapshotService::new(storage, InMemoryObjectStore::new());

        let err = svc
            .upload(&keys.address, envelope_bytes(&keys, 1, None), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::AgentNotWritable));
    }

    #[tokio::test]
    async fn genesis_is_coerced_to_false_after_a_prior_snapshot() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let storage = InMemoryStorage::new();
        storage
            .register(sample_agent(&keys, AgentStatus::Living))
            .await
            .unwrap();
        let svc = SnapshotService::new(storage, InMemoryObjectStore::new());

        let now = Utc::now();
        let first_meta = SnapshotMeta {
            genesis: true,
            ..Default::default()
        };
        let first = svc
            .upload(&keys.address, envelope_bytes(&keys, 1, Some(first_meta)), now)
            .await
            .unwrap();
        assert!(first.snapshot_meta.unwrap().genesis);

        let second_meta = SnapshotMeta {
            genesis: true,
            ..Default::default()
        };
        let second = svc
            .upload(
                &keys.address,
                envelope_bytes(&keys, 2, Some(second_meta)),
                now + Duration::hours(25),
            )
            .await
            .unwrap();
        assert!(!second.snapshot_meta.unwrap().genesis);
    }

    #[tokio::test]
    async fn mismatched_token_agent_is_rejected() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let other = derive_from_mnemonic(
            "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zebra",
        )
        .unwrap();
        let storage = InMemoryStorage::new();
        storage
            .register(sample_agent(&keys, AgentStatus::Living))
            .await
            .unwrap();
        let svc = SnapshotService::new(storage, InMemoryObjectStore::new());

        let err = svc
            .upload(&other.address, envelope_bytes(&keys, 1, None), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::AgentMismatch));
    }
}
