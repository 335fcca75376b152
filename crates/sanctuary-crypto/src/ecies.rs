use hkdf::Hkdf;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::aead::{self, KEY_LEN, NONCE_LEN};
use crate::error::{CryptoError, CryptoResult};

/// A data-encryption key independently wrapped to one recipient's static
/// public key via an ephemeral-keypair ECIES construction (§4.2 "Keying").
#[derive(Clone, Serialize, Deserialize)]
pub struct WrappedKey {
    pub ephemeral_public: Vec<u8>, // SEC1 compressed point
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>, // DEK ciphertext || tag
}

/// Wrap `dek` to `recipient_public` using a fresh ephemeral keypair: ECDH
/// shared secret -> HKDF -> AEAD-wrap of the DEK. `info` domain-separates
/// the recovery and recall paths so they cannot be confused with each other.
pub fn wrap(
    recipient_public: &PublicKey,
    dek: &[u8; KEY_LEN],
    info: &[u8],
) -> CryptoResult<WrappedKey> {
    let ephemeral_secret = SecretKey::random(&mut OsRng);
    let ephemeral_public = ephemeral_secret.public_key();

    let shared = k256::ecdh::diffie_hellman(
        ephemeral_secret.to_nonzero_scalar(),
        recipient_public.as_affine(),
    );

    let mut kek = Zeroizing::new([0u8; KEY_LEN]);
    Hkdf::<Sha256>::new(None, shared.raw_secret_bytes().as_slice())
        .expand(info, &mut *kek)
        .map_err(|_| CryptoError::HkdfFailed)?;

    let mut nonce = [0u8; NONCE_LEN];
    use rand::RngCore;
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = aead::seal(&kek, &nonce, info, dek)?;

    Ok(WrappedKey {
        ephemeral_public: ephemeral_public.to_encoded_point(true).as_bytes().to_vec(),
        nonce,
        ciphertext,
    })
}

/// Unwrap a [`WrappedKey`] with the recipient's static secret, recovering
/// the original DEK. Independent from the other recipient's unwrap path
/// (§4.2 consequence (a)).
pub fn unwrap(
    recipient_secret: &SecretKey,
    wrapped: &WrappedKey,
    info: &[u8],
) -> CryptoResult<[u8; KEY_LEN]> {
    let ephemeral_public = PublicKey::from_sec1_bytes(&wrapped.ephemeral_public)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let shared = k256::ecdh::diffie_hellman(
        recipient_secret.to_nonzero_scalar(),
        ephemeral_public.as_affine(),
    );

    let mut kek = Zeroizing::new([0u8; KEY_LEN]);
    Hkdf::<Sha256>::new(None, shared.raw_secret_bytes().as_slice())
        .expand(info, &mut *kek)
        .map_err(|_| CryptoError::HkdfFailed)?;

    let plaintext = aead::open(&kek, &wrapped.nonce, info, &wrapped.ciphertext)?;
    if plaintext.len() != KEY_LEN {
        return Err(CryptoError::InvalidLength {
            expected: KEY_LEN,
            actual: plaintext.len(),
        });
    }
    let mut dek = [0u8; KEY_LEN];
    dek.copy_from_slice(&plaintext);
    Ok(dek)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        let dek = [9u8; KEY_LEN];

        let wrapped = wrap(&public, &dek, b"sanctuary-recovery-wrap-v1").unwrap();
        let unwrapped = unwrap(&secret, &wrapped, b"sanctuary-recovery-wrap-v1").unwrap();
        assert_eq!(dek, unwrapped);
    }

    #[test]
    fn wrong_recipient_fails() {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        let other_secret = SecretKey::random(&mut OsRng);
        let dek = [9u8; KEY_LEN];

        let wrapped = wrap(&public, &dek, b"info").unwrap();
        assert!(unwrap(&other_secret, &wrapped, b"info").is_err());
    }
}
