use chrono::{DateTime, Utc};
use sanctuary_crypto::{keccak256, Preimage, Signature65, WrappedKey};
use sanctuary_types::{Address, SnapshotId, SnapshotMeta};
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

/// The domain-separation tag for backup header signatures (§4.2, §6).
pub const BACKUP_SIGNING_TAG: &str = "sanctuary-backup-v1";
pub const RECOVERY_WRAP_INFO: &[u8] = b"sanctuary-recovery-wrap-v1";
pub const RECALL_WRAP_INFO: &[u8] = b"sanctuary-recall-wrap-v1";

/// The self-describing, signed backup header (§4.2).
///
/// `snapshot_meta` is intentionally excluded from the signed preimage — the
/// spec requires older clients whose `snapshotMeta` was bolted on after
/// signing to still verify.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackupHeader {
    pub version: u32,
    pub agent: Address,
    pub backup_id: SnapshotId,
    pub seq: u64,
    pub timestamp: i64,
    pub manifest_hash: String,
    pub prev_backup_hash: String,
    pub wrapped_recovery: WrappedKey,
    pub wrapped_recall: WrappedKey,
    pub files_digest: [u8; 32],
    #[serde(with = "BigArray")]
    pub signature: [u8; 65],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_meta: Option<SnapshotMeta>,
}

impl BackupHeader {
    /// Hash of the sorted file-name set, bound into the signature so a
    /// header cannot be replayed over a different file manifest.
    pub fn files_digest(file_names: &[String]) -> [u8; 32] {
        let mut sorted = file_names.to_vec();
        sorted.sort();
        let mut buf = Vec::new();
        for name in &sorted {
            buf.extend_from_slice(name.as_bytes());
            buf.push(b'|');
        }
        keccak256(&buf)
    }

    /// The canonical signed preimage digest (§4.2 "Header signing").
    pub fn signing_digest(
        agent: &Address,
        backup_id: &SnapshotId,
        seq: u64,
        timestamp: i64,
        manifest_hash: &str,
        prev_backup_hash: &str,
        files_digest: &[u8; 32],
        wrapped_recovery: &WrappedKey,
        wrapped_recall: &WrappedKey,
    ) -> [u8; 32] {
        let wrapped_recovery_hash = keccak256(&serde_json::to_vec(wrapped_recovery).unwrap_or_default());
        let wrapped_recall_hash = keccak256(&serde_json::to_vec(wrapped_recall).unwrap_or_default());

        Preimage::new(BACKUP_SIGNING_TAG)
            .field(agent.as_bytes())
            .field_str(&backup_id.to_string())
            .field_u64(seq)
            .field_i64(timestamp)
            .field_str(manifest_hash)
            .field_str(prev_backup_hash)
            .field(files_digest)
            .field(&wrapped_recovery_hash)
            .field(&wrapped_recall_hash)
            .digest()
    }

    /// Recompute the digest this header's own signature was produced over.
    pub fn own_signing_digest(&self) -> [u8; 32] {
        Self::signing_digest(
            &self.agent,
            &self.backup_id,
            self.seq,
            self.timestamp,
            &self.manifest_hash,
            &self.prev_backup_hash,
            &self.files_digest,
            &self.wrapped_recovery,
            &self.wrapped_recall,
        )
    }

    pub fn signature(&self) -> Signature65 {
        Signature65::from_bytes(self.signature)
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_else(Utc::now)
    }
}
