use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentStatus;
use crate::ids::{SnapshotId, StorageHandle};
use crate::snapshot::SnapshotMeta;
use crate::trust::TrustLevel;
use sanctuary_crypto::Address;

/// One entry of the resurrection manifest's snapshot index (§6
/// `agent.resurrect`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: SnapshotId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub storage_handle: StorageHandle,
    pub size_bytes: u64,
    pub manifest_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_meta: Option<SnapshotMeta>,
}

/// The identity block of a resurrection manifest (§6 `agent.resurrect`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub address: Address,
    pub trust_score: f64,
    pub trust_level: TrustLevel,
    pub attestation_count: u64,
    pub registered_at: DateTime<Utc>,
    pub last_backup: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub total_snapshots: u64,
    pub resurrection_count: u64,
}

/// What `agent.resurrect` returns on success (§4.4, §6): identity summary,
/// the full snapshot index newest-first, the immutable genesis declaration,
/// and the status transition that just occurred.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResurrectionManifest {
    pub identity: IdentitySummary,
    pub snapshots: Vec<SnapshotSummary>,
    pub genesis_declaration: Option<String>,
    pub status: AgentStatus,
    pub previous_status: AgentStatus,
}
