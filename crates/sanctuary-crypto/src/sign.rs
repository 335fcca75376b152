use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::address::Address;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::address_from_verifying_key;

/// A 65-byte `(r, s, v)` recoverable signature, as required by §4.1.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature65(pub [u8; 65]);

impl Signature65 {
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    fn split(&self) -> CryptoResult<(Signature, RecoveryId)> {
        let sig = Signature::from_slice(&self.0[..64])
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
        let recid = RecoveryId::from_byte(self.0[64])
            .ok_or_else(|| CryptoError::RecoveryFailed("invalid recovery id".to_string()))?;
        Ok((sig, recid))
    }
}

impl std::fmt::Debug for Signature65 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature65({})", hex::encode(self.0))
    }
}

/// Sign a pre-computed 32-byte digest, producing a recoverable signature.
pub fn sign_digest(secret: &SigningKey, digest: &[u8; 32]) -> CryptoResult<Signature65> {
    let (sig, recid) = secret
        .sign_prehash_recoverable(digest)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = recid.to_byte();
    Ok(Signature65(out))
}

/// Recover the signing verifying key from a digest + signature.
pub fn recover_verifying_key(
    digest: &[u8; 32],
    signature: &Signature65,
) -> CryptoResult<VerifyingKey> {
    let (sig, recid) = signature.split()?;
    VerifyingKey::recover_from_prehash(digest, &sig, recid)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Recover the agent address the signature was produced by.
pub fn recover_address(digest: &[u8; 32], signature: &Signature65) -> CryptoResult<Address> {
    let vk = recover_verifying_key(digest, signature)?;
    Ok(address_from_verifying_key(&vk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_from_mnemonic;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn sign_then_recover_yields_original_address() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let digest = crate::hash::keccak256(b"hello sanctuary");
        let sig = sign_digest(&keys.agent_secret, &digest).unwrap();
        let recovered = recover_address(&digest, &sig).unwrap();
        assert_eq!(recovered, keys.address);
    }

    #[test]
    fn tampered_digest_recovers_a_different_address() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let digest = crate::hash::keccak256(b"hello sanctuary");
        let sig = sign_digest(&keys.agent_secret, &digest).unwrap();
        let other_digest = crate::hash::keccak256(b"goodbye sanctuary");
        let recovered = recover_address(&other_digest, &sig).unwrap();
        assert_ne!(recovered, keys.address);
    }
}
