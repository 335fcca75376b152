//! Sanctuary cryptographic primitives.
//!
//! Deterministic key derivation from a BIP-39 mnemonic, recoverable
//! secp256k1 signatures, HKDF key expansion, and AES-256-GCM AEAD — the
//! foundation every other Sanctuary crate builds its protocol framing on.

#![deny(unsafe_code)]

mod address;
mod aead;
mod ecies;
mod error;
mod hash;
mod kdf;
mod keys;
mod sign;

pub use address::{addresses_match, Address};
pub use aead::{KEY_LEN, NONCE_LEN};
pub use ecies::WrappedKey;
pub use error::{CryptoError, CryptoResult};
pub use hash::{keccak256, Preimage};
pub use kdf::derive_file_key;
pub use keys::{address_from_verifying_key, derive_from_mnemonic, AgentKeys};
pub use sign::{recover_address, recover_verifying_key, sign_digest, Signature65};

pub mod aead_ops {
    pub use crate::aead::{open, seal};
}

pub mod ecies_ops {
    pub use crate::ecies::{unwrap, wrap};
}

// Re-export the curve types callers need to hold/serialise public keys.
pub use k256::ecdsa::{SigningKey, VerifyingKey};
pub use k256::{PublicKey, SecretKey};
