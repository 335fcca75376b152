use chrono::{DateTime, Utc};
use sanctuary_crypto::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{SnapshotId, StorageHandle};

/// Bound on the serialised length of `snapshotMeta` (§4.5 precondition 7).
pub const MAX_SNAPSHOT_META_BYTES: usize = 10 * 1024;

/// Free-form, bounded snapshot metadata (§3 "Snapshot"). Known fields are
/// typed; anything else a client sends is preserved verbatim but capped by
/// the serialised-size check in `sanctuary-snapshots`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SnapshotMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub genesis: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_counter: Option<u64>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One append-only, client-encrypted upload of agent state (§3 "Snapshot").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub agent: Address,
    pub seq: u64,
    pub storage_handle: StorageHandle,
    pub size_bytes: u64,
    pub client_timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub manifest_hash: String,
    pub prev_backup_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_meta: Option<SnapshotMeta>,
}

/// What `snapshot.upload` returns to the caller (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: SnapshotId,
    pub seq: u64,
    pub storage_handle: StorageHandle,
    pub size_bytes: u64,
    pub received_at: DateTime<Utc>,
}
