use chrono::{DateTime, Utc};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sanctuary_crypto::{recover_address, Address, Preimage, PublicKey, Signature65};
use sanctuary_types::{Agent, AgentStatus, MAX_GENESIS_DECLARATION_BYTES};

use crate::error::RegistryError;

/// Domain-separation tag for the registration preimage (§4.1).
pub const REGISTER_TAG: &str = "sanctuary-register-v1";

/// `agent.register` request (§6). The spec's external-interface sketch names
/// `recoveryPubKey` only; `recallPubKey` is carried too, since `Agent`
/// requires an independent recall path per the recall-key open question
/// (§9) and every key the service anchors must be bound by the same
/// signature.
pub struct RegisterRequest {
    pub agent: Address,
    pub recovery_public_key: PublicKey,
    pub recall_public_key: PublicKey,
    pub manifest_hash: String,
    pub manifest_version: u32,
    pub deadline: DateTime<Utc>,
    pub signature: Signature65,
    pub genesis_declaration: Option<String>,
}

pub(crate) fn registration_digest(req: &RegisterRequest) -> [u8; 32] {
    Preimage::new(REGISTER_TAG)
        .field_str(&req.agent.to_hex())
        .field(req.recovery_public_key.to_encoded_point(true).as_bytes())
        .field(req.recall_public_key.to_encoded_point(true).as_bytes())
        .field_str(&req.manifest_hash)
        .field_u64(req.manifest_version as u64)
        .field_i64(req.deadline.timestamp())
        .field_str(req.genesis_declaration.as_deref().unwrap_or(""))
        .digest()
}

/// Validate and build the `Agent` row `agent.register` inserts, without
/// touching storage (kept pure so registration and its unit tests do not
/// need a backend).
pub fn prepare_registration(
    req: RegisterRequest,
    now: DateTime<Utc>,
) -> Result<Agent, RegistryError> {
    if req.deadline <= now {
        return Err(RegistryError::DeadlineExpired);
    }

    if let Some(declaration) = &req.genesis_declaration {
        if declaration.len() > MAX_GENESIS_DECLARATION_BYTES {
            return Err(RegistryError::GenesisTooLong(MAX_GENESIS_DECLARATION_BYTES));
        }
    }

    let digest = registration_digest(&req);
    let recovered =
        recover_address(&digest, &req.signature).map_err(|_| RegistryError::SignatureInvalid)?;
    if recovered != req.agent {
        return Err(RegistryError::SignatureInvalid);
    }

    Ok(Agent {
        address: req.agent,
        recovery_public_key: req.recovery_public_key,
        recall_public_key: req.recall_public_key,
        manifest_hash: req.manifest_hash,
        manifest_version: req.manifest_version,
        registered_at: now,
        status: AgentStatus::Living,
        genesis_declaration: req.genesis_declaration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sanctuary_crypto::{derive_from_mnemonic, sign_digest};

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn signed_request(
        keys: &sanctuary_crypto::AgentKeys,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
        genesis_declaration: Option<String>,
    ) -> RegisterRequest {
        let mut req = RegisterRequest {
            agent: keys.address,
            recovery_public_key: keys.recovery_public(),
            recall_public_key: keys.recall_public(),
            manifest_hash: "deadbeef".to_string(),
            manifest_version: 1,
            deadline,
            signature: Signature65::from_bytes([0u8; 65]),
            genesis_declaration,
        };
        let digest = registration_digest(&req);
        req.signature = sign_digest(&keys.agent_secret, &digest).unwrap();
        let _ = now;
        req
    }

    #[test]
    fn valid_registration_succeeds() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let now = Utc::now();
        let req = signed_request(&keys, now, now + Duration::minutes(5), Some("I am.".to_string()));
        let agent = prepare_registration(req, now).unwrap();
        assert_eq!(agent.address, keys.address);
        assert_eq!(agent.status, AgentStatus::Living);
    }

    #[test]
    fn expired_deadline_is_rejected() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let now = Utc::now();
        let req = signed_request(&keys, now, now - Duration::seconds(1), None);
        let err = prepare_registration(req, now).unwrap_err();
        assert!(matches!(err, RegistryError::DeadlineExpired));
    }

    #[test]
    fn tampered_manifest_hash_fails_signature_check() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let now = Utc::now();
        let mut req = signed_request(&keys, now, now + Duration::minutes(5), None);
        req.manifest_hash = "tampered".to_string();
        let err = prepare_registration(req, now).unwrap_err();
        assert!(matches!(err, RegistryError::SignatureInvalid));
    }

    #[test]
    fn oversized_genesis_declaration_is_rejected() {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let now = Utc::now();
        let too_long = "x".repeat(MAX_GENESIS_DECLARATION_BYTES + 1);
        let req = signed_request(&keys, now, now + Duration::minutes(5), Some(too_long));
        let err = prepare_registration(req, now).unwrap_err();
        assert!(matches!(err, RegistryError::GenesisTooLong(_)));
    }
}
