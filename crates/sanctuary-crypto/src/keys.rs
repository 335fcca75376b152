use hkdf::Hkdf;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::{PublicKey, SecretKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::address::Address;
use crate::error::{CryptoError, CryptoResult};
use crate::hash::keccak256;

const AGENT_SECRET_INFO: &[u8] = b"sanctuary-derive-agent-secret-v1";
const RECOVERY_SECRET_INFO: &[u8] = b"sanctuary-derive-recovery-secret-v1";
const RECALL_SECRET_INFO: &[u8] = b"sanctuary-derive-recall-secret-v1";

/// The four keys derived deterministically from a mnemonic, per §4.1.
pub struct AgentKeys {
    /// Signs auth challenges, registration, snapshot headers, attestations.
    pub agent_secret: SigningKey,
    /// Unwraps the recovery-path DEK of every snapshot.
    pub recovery_secret: SecretKey,
    /// Unwraps the recall-path DEK of every snapshot.
    pub recall_secret: SecretKey,
    /// `keccak256(uncompressed agent public point)[12..]`.
    pub address: Address,
}

impl AgentKeys {
    pub fn recovery_public(&self) -> PublicKey {
        self.recovery_secret.public_key()
    }

    pub fn recall_public(&self) -> PublicKey {
        self.recall_secret.public_key()
    }

    pub fn agent_public(&self) -> VerifyingKey {
        *self.agent_secret.verifying_key()
    }
}

/// Parse a BIP-39 mnemonic and derive the full `AgentKeys` set.
///
/// Determinism (spec §8 "Determinism of derivation"): the same mnemonic
/// always produces the same seed, hence the same three secrets and address,
/// independent of machine or process.
pub fn derive_from_mnemonic(phrase: &str) -> CryptoResult<AgentKeys> {
    let mnemonic = bip39::Mnemonic::parse(phrase)
        .map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))?;
    let seed = Zeroizing::new(mnemonic.to_seed(""));
    derive_from_seed(seed.as_slice())
}

fn derive_from_seed(seed: &[u8]) -> CryptoResult<AgentKeys> {
    let agent_secret = derive_signing_key(seed, AGENT_SECRET_INFO)?;
    let recovery_secret = derive_secret_key(seed, RECOVERY_SECRET_INFO)?;
    let recall_secret = derive_secret_key(seed, RECALL_SECRET_INFO)?;
    let address = address_from_verifying_key(agent_secret.verifying_key());

    Ok(AgentKeys {
        agent_secret,
        recovery_secret,
        recall_secret,
        address,
    })
}

/// `keccak256(uncompressed public point without the 0x04 prefix)[12..32]`,
/// the standard secp256k1 address scheme this service's address format
/// mirrors (§ GLOSSARY "Agent address").
pub fn address_from_verifying_key(vk: &VerifyingKey) -> Address {
    let encoded = vk.to_encoded_point(false);
    let full = encoded.as_bytes(); // 0x04 || X(32) || Y(32)
    let hash = keccak256(&full[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

/// HKDF-expand a 32-byte scalar from `ikm`/`info`, retrying with a counter
/// suffix on the vanishingly unlikely chance of an out-of-range scalar.
fn derive_scalar(ikm: &[u8], info: &[u8]) -> CryptoResult<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    for counter in 0u8..=255 {
        let mut okm = Zeroizing::new([0u8; 32]);
        let mut info_buf = info.to_vec();
        info_buf.push(counter);
        hk.expand(&info_buf, &mut *okm)
            .map_err(|_| CryptoError::HkdfFailed)?;
        if SecretKey::from_slice(&*okm).is_ok() {
            return Ok(okm);
        }
    }
    Err(CryptoError::KeyDerivationFailed)
}

fn derive_signing_key(ikm: &[u8], info: &[u8]) -> CryptoResult<SigningKey> {
    let scalar = derive_scalar(ikm, info)?;
    SigningKey::from_bytes((&*scalar).into())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))
}

fn derive_secret_key(ikm: &[u8], info: &[u8]) -> CryptoResult<SecretKey> {
    let scalar = derive_scalar(ikm, info)?;
    SecretKey::from_slice(&*scalar).map_err(|e| CryptoError::SigningFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let b = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.agent_secret.to_bytes(), b.agent_secret.to_bytes());
    }

    #[test]
    fn distinct_mnemonics_diverge() {
        let a = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let other = "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong";
        let b = derive_from_mnemonic(other);
        // the canonical wrong-checksum vector is invalid; use a valid second vector instead
        let b = b.unwrap_or_else(|_| {
            derive_from_mnemonic(
                "legal winner thank year wave sausage worth useful legal winner thank yellow",
            )
            .unwrap()
        });
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn the_three_secrets_are_independent() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        assert_ne!(
            keys.agent_secret.to_bytes().as_slice(),
            keys.recovery_secret.to_bytes().as_slice()
        );
        assert_ne!(
            keys.recovery_secret.to_bytes().as_slice(),
            keys.recall_secret.to_bytes().as_slice()
        );
    }
}
