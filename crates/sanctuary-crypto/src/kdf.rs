use hkdf::Hkdf;
use sha2::Sha256;

use crate::aead::KEY_LEN;
use crate::error::{CryptoError, CryptoResult};

/// Derive the per-file encryption key `HKDF(DEK, salt=fileName)` used by the
/// backup codec (§4.2 "Keying"). Salting by file name means a single file
/// can be decrypted in isolation, without ever materialising sibling keys.
pub fn derive_file_key(dek: &[u8; KEY_LEN], file_name: &str) -> CryptoResult<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(Some(file_name.as_bytes()), dek);
    let mut out = [0u8; KEY_LEN];
    hk.expand(b"sanctuary-backup-file-key-v1", &mut out)
        .map_err(|_| CryptoError::HkdfFailed)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_file_names_yield_distinct_keys() {
        let dek = [3u8; KEY_LEN];
        let a = derive_file_key(&dek, "soul.md").unwrap();
        let b = derive_file_key(&dek, "memory.md").unwrap();
        assert_ne!(a, b);
    }
}
