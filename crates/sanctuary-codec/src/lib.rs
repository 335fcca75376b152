//! The encrypted backup envelope codec (§4.2).
//!
//! A backup is a signed, self-describing header plus a set of independently
//! AEAD-sealed files, whose data-encryption key is wrapped twice: once to
//! the agent's recovery key and once to its recall key. Any party holding
//! either secret can unwrap the DEK and, from it, re-derive the per-file key
//! for exactly the file it wants — without touching any other file.

mod aad;
mod error;
mod framing;
mod header;

use rand::RngCore;
use sanctuary_crypto::{
    aead_ops, ecies_ops, keccak256, recover_address, sign_digest, PublicKey, SecretKey,
    Signature65, SigningKey,
};
use sanctuary_types::{Address, SnapshotId, SnapshotMeta};
use std::collections::HashMap;

pub use aad::{file_aad, FILE_AEAD_TAG};
pub use error::{CodecError, CodecResult};
pub use framing::MAX_FILE_COUNT;
pub use header::{BackupHeader, BACKUP_SIGNING_TAG, RECALL_WRAP_INFO, RECOVERY_WRAP_INFO};

const HEADER_VERSION: u32 = 1;

/// A decoded, signature-verified envelope. Files remain encrypted until
/// [`Envelope::decrypt_file`] is called with an unwrapped DEK.
pub struct Envelope {
    pub header: BackupHeader,
    files: HashMap<String, framing::EncryptedFileEntry>,
}

/// Encode a new backup envelope: wrap `dek` to both recipients, seal every
/// file under a per-file key derived from it, sign the header, and frame the
/// whole thing into bytes ready to hand to the object store.
pub fn encode(
    agent_secret: &SigningKey,
    agent: Address,
    backup_id: SnapshotId,
    seq: u64,
    timestamp: i64,
    prev_backup_hash: String,
    manifest_hash: String,
    recovery_public: &PublicKey,
    recall_public: &PublicKey,
    dek: &[u8; sanctuary_crypto::KEY_LEN],
    files: &HashMap<String, Vec<u8>>,
    snapshot_meta: Option<SnapshotMeta>,
) -> CodecResult<Vec<u8>> {
    let mut file_names: Vec<String> = files.keys().cloned().collect();
    file_names.sort();

    let files_digest = BackupHeader::files_digest(&file_names);

    let wrapped_recovery = ecies_ops::wrap(recovery_public, dek, RECOVERY_WRAP_INFO)?;
    let wrapped_recall = ecies_ops::wrap(recall_public, dek, RECALL_WRAP_INFO)?;

    let digest = BackupHeader::signing_digest(
        &agent,
        &backup_id,
        seq,
        timestamp,
        &manifest_hash,
        &prev_backup_hash,
        &files_digest,
        &wrapped_recovery,
        &wrapped_recall,
    );
    let signature = sign_digest(agent_secret, &digest)?;

    let header = BackupHeader {
        version: HEADER_VERSION,
        agent,
        backup_id,
        seq,
        timestamp,
        manifest_hash: manifest_hash.clone(),
        prev_backup_hash,
        wrapped_recovery,
        wrapped_recall,
        files_digest,
        signature: *signature.as_bytes(),
        snapshot_meta,
    };

    let mut encrypted_files = Vec::with_capacity(files.len());
    for name in &file_names {
        let plaintext = &files[name];
        let file_key = sanctuary_crypto::derive_file_key(dek, name)?;
        let aad = file_aad(&header.backup_id, timestamp, &header.agent, &manifest_hash, name);

        let mut nonce = [0u8; sanctuary_crypto::NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = aead_ops::seal(&file_key, &nonce, &aad, plaintext)?;

        encrypted_files.push(framing::EncryptedFileEntry {
            name: name.clone(),
            nonce,
            ciphertext,
        });
    }

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| CodecError::Serialization(e.to_string()))?;

    Ok(framing::encode_frame(&header_json, &encrypted_files))
}

/// Decode and signature-verify a backup envelope's framing and header,
/// without decrypting any file. `decode` alone is enough to confirm the
/// envelope was produced by `header.agent` over exactly this file manifest.
pub fn decode(bytes: &[u8]) -> CodecResult<Envelope> {
    let (header_json, encrypted_files) = framing::decode_frame(bytes)?;
    let header: BackupHeader = serde_json::from_slice(&header_json)
        .map_err(|e| CodecError::Serialization(e.to_string()))?;

    let digest = header.own_signing_digest();
    let recovered = recover_address(&digest, &header.signature())?;
    if recovered != header.agent {
        return Err(CodecError::SignatureInvalid);
    }

    let mut file_names: Vec<String> = encrypted_files.iter().map(|f| f.name.clone()).collect();
    file_names.sort();
    if BackupHeader::files_digest(&file_names) != header.files_digest {
        return Err(CodecError::BackupCorrupted(
            "file manifest does not match the signed files digest".to_string(),
        ));
    }

    let files = encrypted_files
        .into_iter()
        .map(|f| (f.name.clone(), f))
        .collect();

    Ok(Envelope { header, files })
}

/// Unwrap the data-encryption key along the recovery path.
pub fn unwrap_dek_recovery(
    envelope: &Envelope,
    recovery_secret: &SecretKey,
) -> CodecResult<[u8; sanctuary_crypto::KEY_LEN]> {
    Ok(ecies_ops::unwrap(
        recovery_secret,
        &envelope.header.wrapped_recovery,
        RECOVERY_WRAP_INFO,
    )?)
}

/// Unwrap the data-encryption key along the recall path, independent of the
/// recovery path above (§4.2 consequence (a)).
pub fn unwrap_dek_recall(
    envelope: &Envelope,
    recall_secret: &SecretKey,
) -> CodecResult<[u8; sanctuary_crypto::KEY_LEN]> {
    Ok(ecies_ops::unwrap(
        recall_secret,
        &envelope.header.wrapped_recall,
        RECALL_WRAP_INFO,
    )?)
}

impl Envelope {
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|s| s.as_str())
    }

    /// Decrypt exactly one file, given the unwrapped DEK. Derives that
    /// file's key in isolation; other files' ciphertexts and keys are never
    /// touched (§8 "Round-trip selective decrypt").
    pub fn decrypt_file(
        &self,
        dek: &[u8; sanctuary_crypto::KEY_LEN],
        file_name: &str,
    ) -> CodecResult<Vec<u8>> {
        let entry = self
            .files
            .get(file_name)
            .ok_or_else(|| CodecError::FileNotFound(file_name.to_string()))?;

        let file_key = sanctuary_crypto::derive_file_key(dek, file_name)?;
        let aad = file_aad(
            &self.header.backup_id,
            self.header.timestamp,
            &self.header.agent,
            &self.header.manifest_hash,
            file_name,
        );

        Ok(aead_ops::open(&file_key, &entry.nonce, &aad, &entry.ciphertext)?)
    }
}

/// Recompute the manifest hash for a file-name set the same way [`encode`]
/// does, used by callers that need to verify a manifest before it is wrapped
/// into a header (e.g. the snapshot upload precondition checks).
pub fn manifest_hash(file_names: &[String]) -> String {
    hex::encode(BackupHeader::files_digest(file_names))
}

/// Hash a serialised `Signature65`-bearing value for logging/audit purposes.
/// Exposed mainly so callers outside this crate never need to reach into
/// `sanctuary_crypto` directly just to fingerprint a signature.
pub fn signature_fingerprint(signature: &Signature65) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanctuary_crypto::derive_from_mnemonic;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn sample_files() -> HashMap<String, Vec<u8>> {
        let mut files = HashMap::new();
        files.insert("soul.md".to_string(), b"A".to_vec());
        files.insert("memory.md".to_string(), b"B".to_vec());
        files
    }

    fn sample_dek() -> [u8; sanctuary_crypto::KEY_LEN] {
        [42u8; sanctuary_crypto::KEY_LEN]
    }

    #[test]
    fn round_trip_selective_decrypt() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let dek = sample_dek();
        let files = sample_files();

        let bytes = encode(
            &keys.agent_secret,
            keys.address,
            SnapshotId::generate(),
            1,
            1_700_000_000_000,
            "0".repeat(64),
            "deadbeef".to_string(),
            &keys.recovery_public(),
            &keys.recall_public(),
            &dek,
            &files,
            None,
        )
        .unwrap();

        let envelope = decode(&bytes).unwrap();
        let recovered_dek = unwrap_dek_recovery(&envelope, &keys.recovery_secret).unwrap();
        assert_eq!(recovered_dek, dek);

        let soul = envelope.decrypt_file(&recovered_dek, "soul.md").unwrap();
        assert_eq!(soul, b"A");

        // decrypting only one file never requires or touches the other's key
        let memory = envelope.decrypt_file(&recovered_dek, "memory.md").unwrap();
        assert_eq!(memory, b"B");
        assert_ne!(soul, memory);
    }

    #[test]
    fn recall_path_is_independent_of_recovery_path() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let dek = sample_dek();
        let files = sample_files();

        let bytes = encode(
            &keys.agent_secret,
            keys.address,
            SnapshotId::generate(),
            1,
            1_700_000_000_000,
            "0".repeat(64),
            "deadbeef".to_string(),
            &keys.recovery_public(),
            &keys.recall_public(),
            &dek,
            &files,
            None,
        )
        .unwrap();

        let envelope = decode(&bytes).unwrap();
        let via_recall = unwrap_dek_recall(&envelope, &keys.recall_secret).unwrap();
        assert_eq!(via_recall, dek);

        // the recovery secret cannot unwrap the recall-wrapped copy or vice versa
        assert!(ecies_ops::unwrap(
            &keys.recall_secret,
            &envelope.header.wrapped_recovery,
            RECOVERY_WRAP_INFO
        )
        .is_err());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let dek = sample_dek();
        let files = sample_files();

        let mut bytes = encode(
            &keys.agent_secret,
            keys.address,
            SnapshotId::generate(),
            1,
            1_700_000_000_000,
            "0".repeat(64),
            "deadbeef".to_string(),
            &keys.recovery_public(),
            &keys.recall_public(),
            &dek,
            &files,
            None,
        )
        .unwrap();

        // flip a byte inside the header JSON region (well past the length prefix)
        let flip_at = bytes.len() / 2;
        bytes[flip_at] ^= 0xff;

        // either framing breaks (BackupCorrupted/Serialization) or the signature
        // no longer recovers the claimed agent (SignatureInvalid) -- never a panic
        let result = decode(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn aead_binding_rejects_file_moved_between_backups() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let dek = sample_dek();
        let files = sample_files();

        let backup_a = SnapshotId::generate();
        let backup_b = SnapshotId::generate();

        let bytes_a = encode(
            &keys.agent_secret,
            keys.address,
            backup_a,
            1,
            1_700_000_000_000,
            "0".repeat(64),
            "deadbeef".to_string(),
            &keys.recovery_public(),
            &keys.recall_public(),
            &dek,
            &files,
            None,
        )
        .unwrap();
        let bytes_b = encode(
            &keys.agent_secret,
            keys.address,
            backup_b,
            2,
            1_700_000_000_001,
            "0".repeat(64),
            "deadbeef".to_string(),
            &keys.recovery_public(),
            &keys.recall_public(),
            &dek,
            &files,
            None,
        )
        .unwrap();

        let envelope_a = decode(&bytes_a).unwrap();
        let envelope_b = decode(&bytes_b).unwrap();
        let dek_a = unwrap_dek_recovery(&envelope_a, &keys.recovery_secret).unwrap();

        // splice backup B's ciphertext for "soul.md" into a synthetic envelope
        // bound to backup A's AAD fields -- the AEAD tag must not verify
        let file_key = sanctuary_crypto::derive_file_key(&dek_a, "soul.md").unwrap();
        let wrong_aad = file_aad(
            &envelope_a.header.backup_id,
            envelope_a.header.timestamp,
            &envelope_a.header.agent,
            &envelope_a.header.manifest_hash,
            "soul.md",
        );
        let entry_b = &envelope_b.files["soul.md"];
        let result = aead_ops::open(&file_key, &entry_b.nonce, &wrong_aad, &entry_b.ciphertext);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_file_name_is_rejected() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let dek = sample_dek();
        let files = sample_files();

        let bytes = encode(
            &keys.agent_secret,
            keys.address,
            SnapshotId::generate(),
            1,
            1_700_000_000_000,
            "0".repeat(64),
            "deadbeef".to_string(),
            &keys.recovery_public(),
            &keys.recall_public(),
            &dek,
            &files,
            None,
        )
        .unwrap();

        let envelope = decode(&bytes).unwrap();
        let dek = unwrap_dek_recovery(&envelope, &keys.recovery_secret).unwrap();
        let err = envelope.decrypt_file(&dek, "does-not-exist.md").unwrap_err();
        assert!(matches!(err, CodecError::FileNotFound(_)));
    }
}
