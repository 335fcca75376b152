use chrono::{DateTime, Duration, Utc};
use sanctuary_crypto::{addresses_match, recover_address, Address, Preimage, Signature65};
use sanctuary_storage::{ChallengeRecord, ChallengeRepository};

use crate::error::AuthError;
use crate::token::TokenCodec;

/// Domain-separation tag for the challenge-response preimage (§4.1).
pub const CHALLENGE_TAG: &str = "sanctuary-auth-challenge-v1";

/// What `challenge.verify` returns on success (§6).
pub struct IssuedToken {
    pub bearer_token: String,
    pub expires_at: DateTime<Utc>,
}

/// The three-step challenge/response protocol of §4.3, generic over any
/// [`ChallengeRepository`] backend.
pub struct AuthService<S> {
    storage: S,
    tokens: TokenCodec,
    challenge_ttl: Duration,
    token_ttl: Duration,
}

impl<S: ChallengeRepository> AuthService<S> {
    pub fn new(storage: S, tokens: TokenCodec, challenge_ttl: Duration, token_ttl: Duration) -> Self {
        Self {
            storage,
            tokens,
            challenge_ttl,
            token_ttl,
        }
    }

    /// Step 1, "Issue".
    pub async fn issue_challenge(
        &self,
        agent: Address,
        now: DateTime<Utc>,
    ) -> Result<(sanctuary_types::ChallengeNonce, DateTime<Utc>), AuthError> {
        let nonce = sanctuary_types::ChallengeNonce::generate();
        let expires_at = now + self.challenge_ttl;
        self.storage
            .create(ChallengeRecord {
                nonce,
                agent,
                expires_at,
            })
            .await?;
        Ok((nonce, expires_at))
    }

    /// Steps 2/3, "Respond"/"Verify". `agent` is the address claimed by the
    /// caller; it must match both the challenge's bound agent and the
    /// signature's recovered address.
    pub async fn verify_challenge(
        &self,
        agent: Address,
        nonce: sanctuary_types::ChallengeNonce,
        timestamp: DateTime<Utc>,
        signature: Signature65,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        // A nonce bound to a different agent is indistinguishable from a
        // missing one to the caller, so cross-agent existence is not leaked.
        let record = match self.storage.peek(&nonce).await? {
            Some(record) if addresses_match(&record.agent.to_hex(), &agent.to_hex()) => record,
            _ => return Err(AuthError::ChallengeMissing),
        };

        if record.expires_at <= now {
            return Err(AuthError::ChallengeExpired);
        }

        let digest = Preimage::new(CHALLENGE_TAG)
            .field(&nonce.0)
            .field_i64(timestamp.timestamp())
            .digest();
        let recovered = recover_address(&digest, &signature).map_err(|_| AuthError::SignatureInvalid)?;
        if recovered != agent {
            return Err(AuthError::SignatureInvalid);
        }

        if !self.storage.try_consume(&nonce, now).await? {
            return Err(AuthError::ChallengeConsumed);
        }

        let bearer_token = self.tokens.issue(agent, now, self.token_ttl);
        Ok(IssuedToken {
            bearer_token,
            expires_at: now + self.token_ttl,
        })
    }

    /// Verify a bearer token presented on a subsequent call, returning the
    /// agent it is scoped to.
    pub fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Result<Address, AuthError> {
        self.tokens.verify(token, now)
    }
}

/// §4.3 "Authorisation rule": a request naming `claimed_agent` in its path or
/// body is accepted only when it matches the token's bound agent, compared
/// case-insensitively on the 40-hex form.
pub fn authorize(token_agent: &Address, claimed_agent: &Address) -> Result<(), AuthError> {
    if addresses_match(&token_agent.to_hex(), &claimed_agent.to_hex()) {
        Ok(())
    } else {
        Err(AuthError::AgentMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanctuary_crypto::{derive_from_mnemonic, sign_digest};
    use sanctuary_storage::memory::InMemoryStorage;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn service() -> AuthService<InMemoryStorage> {
        AuthService::new(
            InMemoryStorage::new(),
            TokenCodec::new(TokenCodec::generate_key()),
            Duration::minutes(5),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn full_round_trip_issues_a_token() {
        let svc = service();
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let now = Utc::now();

        let (nonce, _expiry) = svc.issue_challenge(keys.address, now).await.unwrap();

        let digest = Preimage::new(CHALLENGE_TAG)
            .field(&nonce.0)
            .field_i64(now.timestamp())
            .digest();
        let sig = sign_digest(&keys.agent_secret, &digest).unwrap();

        let issued = svc
            .verify_challenge(keys.address, nonce, now, sig, now)
            .await
            .unwrap();

        let verified_agent = svc.verify_token(&issued.bearer_token, now).unwrap();
        assert_eq!(verified_agent, keys.address);
    }

    #[tokio::test]
    async fn nonce_cannot_be_reused() {
        let svc = service();
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let now = Utc::now();

        let (nonce, _) = svc.issue_challenge(keys.address, now).await.unwrap();
        let digest = Preimage::new(CHALLENGE_TAG)
            .field(&nonce.0)
            .field_i64(now.timestamp())
            .digest();
        let sig = sign_digest(&keys.agent_secret, &digest).unwrap();

        svc.verify_challenge(keys.address, nonce, now, sig, now)
            .await
            .unwrap();

        let digest2 = Preimage::new(CHALLENGE_TAG)
            .field(&nonce.0)
            .field_i64(now.timestamp())
            .digest();
        let sig2 = sign_digest(&keys.agent_secret, &digest2).unwrap();
        let err = svc
            .verify_challenge(keys.address, nonce, now, sig2, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ChallengeConsumed));
    }

    #[tokio::test]
    async fn wrong_signer_is_rejected() {
        let svc = service();
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let impostor = derive_from_mnemonic(
            "legal winner thank year wave sausage worth useful legal winner thank yellow",
        )
        .unwrap();
        let now = Utc::now();

        let (nonce, _) = svc.issue_challenge(keys.address, now).await.unwrap();
        let digest = Preimage::new(CHALLENGE_TAG)
            .field(&nonce.0)
            .field_i64(now.timestamp())
            .digest();
        let sig = sign_digest(&impostor.agent_secret, &digest).unwrap();

        let err = svc
            .verify_challenge(keys.address, nonce, now, sig, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureInvalid));
    }

    #[tokio::test]
    async fn expired_challenge_is_rejected() {
        let svc = service();
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        let now = Utc::now();

        let (nonce, _) = svc.issue_challenge(keys.address, now).await.unwrap();
        let later = now + Duration::minutes(6);
        let digest = Preimage::new(CHALLENGE_TAG)
            .field(&nonce.0)
            .field_i64(later.timestamp())
            .digest();
        let sig = sign_digest(&keys.agent_secret, &digest).unwrap();

        let err = svc
            .verify_challenge(keys.address, nonce, later, sig, later)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ChallengeExpired));
    }
}
