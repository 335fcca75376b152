use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sanctuary_crypto::Address;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    agent: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Signs and verifies bearer tokens binding `{agent, issuedAt, expiry}`
/// (§4.3). The verifier key is process-local in-memory state (§5): every
/// token issued by one process instance must be verified by that same
/// instance.
#[derive(Clone)]
pub struct TokenCodec {
    key: Vec<u8>,
}

impl TokenCodec {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// A fresh random verifier key, for a process that has no configured one.
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts a key of any length")
    }

    pub fn issue(&self, agent: Address, now: DateTime<Utc>, ttl: Duration) -> String {
        let payload = TokenPayload {
            agent: agent.to_hex(),
            issued_at: now,
            expires_at: now + ttl,
        };
        let payload_hex = hex::encode(serde_json::to_vec(&payload).expect("payload is plain data"));

        let mut mac = self.mac();
        mac.update(payload_hex.as_bytes());
        let tag = mac.finalize().into_bytes();

        format!("{payload_hex}.{}", hex::encode(tag))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Address, AuthError> {
        let (payload_hex, tag_hex) = token.split_once('.').ok_or(AuthError::TokenInvalid)?;

        let tag = hex::decode(tag_hex).map_err(|_| AuthError::TokenInvalid)?;
        let mut mac = self.mac();
        mac.update(payload_hex.as_bytes());
        mac.verify_slice(&tag).map_err(|_| AuthError::TokenInvalid)?;

        let payload_json = hex::decode(payload_hex).map_err(|_| AuthError::TokenInvalid)?;
        let payload: TokenPayload =
            serde_json::from_slice(&payload_json).map_err(|_| AuthError::TokenInvalid)?;

        if payload.expires_at <= now {
            return Err(AuthError::TokenExpired);
        }

        Address::from_hex(&payload.agent).map_err(|_| AuthError::TokenInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let codec = TokenCodec::new(TokenCodec::generate_key());
        let addr = Address::from_bytes([7u8; 20]);
        let now = Utc::now();
        let token = codec.issue(addr, now, Duration::minutes(15));
        let recovered = codec.verify(&token, now).unwrap();
        assert_eq!(recovered, addr);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new(TokenCodec::generate_key());
        let addr = Address::from_bytes([7u8; 20]);
        let now = Utc::now();
        let token = codec.issue(addr, now, Duration::minutes(15));
        let later = now + Duration::minutes(16);
        let err = codec.verify(&token, later).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = TokenCodec::new(TokenCodec::generate_key());
        let addr = Address::from_bytes([7u8; 20]);
        let now = Utc::now();
        let mut token = codec.issue(addr, now, Duration::minutes(15));
        token.push('f');
        let err = codec.verify(&token, now).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let issuer = TokenCodec::new(TokenCodec::generate_key());
        let verifier = TokenCodec::new(TokenCodec::generate_key());
        let addr = Address::from_bytes([7u8; 20]);
        let now = Utc::now();
        let token = issuer.issue(addr, now, Duration::minutes(15));
        let err = verifier.verify(&token, now).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }
}
