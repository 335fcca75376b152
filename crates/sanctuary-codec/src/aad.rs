use sanctuary_types::{Address, SnapshotId};

/// Per-file domain tag, distinct from the header's signing tag, per §4.2.
pub const FILE_AEAD_TAG: &str = "sanctuary-backup-file-v1";

/// Build the additional authenticated data for one file:
/// `tag || backupId || timestamp || agent || manifestHash || fileName`,
/// verbatim and in order (§9 "Cross-backup AAD binding"). Substituting a
/// file from another backup, or between two agents, changes at least one of
/// these fields and so fails decryption (§8 "AEAD binding").
pub fn file_aad(
    backup_id: &SnapshotId,
    timestamp: i64,
    agent: &Address,
    manifest_hash: &str,
    file_name: &str,
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(FILE_AEAD_TAG.as_bytes());
    buf.push(b'|');
    buf.extend_from_slice(backup_id.to_string().as_bytes());
    buf.push(b'|');
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.push(b'|');
    buf.extend_from_slice(agent.as_bytes());
    buf.push(b'|');
    buf.extend_from_slice(manifest_hash.as_bytes());
    buf.push(b'|');
    buf.extend_from_slice(file_name.as_bytes());
    buf
}
