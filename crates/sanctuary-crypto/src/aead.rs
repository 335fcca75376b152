use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::{CryptoError, CryptoResult};

pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// Seal `plaintext` under `key` with a 96-bit `nonce` and associated data,
/// returning `ciphertext || tag` (AES-256-GCM, 128-bit tag) per §4.1.
pub fn seal(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AeadFailed)
}

/// Open a `ciphertext || tag` blob produced by [`seal`]. Any mismatch in the
/// key, nonce, or AAD binding causes this to fail (§8 "AEAD binding").
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AeadFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [7u8; KEY_LEN];
        let nonce = [1u8; NONCE_LEN];
        let aad = b"binding";
        let ct = seal(&key, &nonce, aad, b"hello").unwrap();
        let pt = open(&key, &nonce, aad, &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn aad_mismatch_fails() {
        let key = [7u8; KEY_LEN];
        let nonce = [1u8; NONCE_LEN];
        let ct = seal(&key, &nonce, b"binding-a", b"hello").unwrap();
        assert!(open(&key, &nonce, b"binding-b", &ct).is_err());
    }
}
