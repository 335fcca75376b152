use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{CryptoError, CryptoResult};

/// A 20-byte agent address derived from the hash of an agent's public key.
///
/// Equality and hashing are case-insensitive over the hex representation,
/// matching the §4.3 authorisation rule ("case-insensitive address comparison
/// on the 40-hex form"). Serialises as its lowercase 40-hex form.
#[derive(Clone, Copy)]
pub struct Address(pub [u8; 20]);

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidLength {
            expected: 40,
            actual: e.to_string().len(),
        })?;
        if bytes.len() != 20 {
            return Err(CryptoError::InvalidLength {
                expected: 20,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Address {}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Case-insensitive comparison of the 40-hex form, as §4.3 requires for
/// binding a bearer token's agent to a request's path/body agent.
pub fn addresses_match(a: &str, b: &str) -> bool {
    let norm = |s: &str| s.strip_prefix("0x").unwrap_or(s).to_ascii_lowercase();
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let addr = Address::from_bytes([0xab; 20]);
        let hex = addr.to_hex();
        let parsed = Address::from_hex(&hex).unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn case_insensitive_match() {
        assert!(addresses_match(
            "0xDEADBEEF00000000000000000000000000000000",
            "deadbeef00000000000000000000000000000000"
        ));
        assert!(!addresses_match(
            "0xdeadbeef00000000000000000000000000000000",
            "0xfeedface0000000000000000000000000000000"
        ));
    }
}
