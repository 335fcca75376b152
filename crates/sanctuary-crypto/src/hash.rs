use sha3::{Digest, Keccak256};

/// The collision-resistant 256-bit hash used throughout Sanctuary: address
/// derivation, signed-preimage digests, manifest hashes and note hashes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&out);
    buf
}

/// Builds a domain-separated, canonically-ordered signed preimage and
/// reduces it to a 32-byte digest ready for `sign_prehash`.
///
/// §4.1: "All signed preimages are domain-separated by a literal ASCII tag
/// ... concatenated with the typed fields in canonical order." Fields are
/// joined with `|`, matching the header-signing description in §4.2.
pub struct Preimage {
    buf: Vec<u8>,
}

impl Preimage {
    pub fn new(tag: &str) -> Self {
        Self {
            buf: tag.as_bytes().to_vec(),
        }
    }

    pub fn field(mut self, bytes: &[u8]) -> Self {
        self.buf.push(b'|');
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn field_str(self, s: &str) -> Self {
        self.field(s.as_bytes())
    }

    pub fn field_u64(self, n: u64) -> Self {
        self.field(&n.to_le_bytes())
    }

    pub fn field_i64(self, n: i64) -> Self {
        self.field(&n.to_le_bytes())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn digest(self) -> [u8; 32] {
        keccak256(&self.buf)
    }
}
