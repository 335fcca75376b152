use chrono::{DateTime, Duration, Utc};
use sanctuary_crypto::Address;
use sanctuary_storage::{
    AgentRepository, AttestationRepository, ResurrectionRepository, SnapshotRepository,
    TrustScoreRepository,
};
use sanctuary_types::{Attestation, AttestationLedger, TrustScore};
use std::collections::{HashMap, HashSet};

use crate::attest::attest;
use crate::error::TrustError;
use crate::score::{attestation_seed, compute_trust_score, propagate_attestation_scores, TrustInputs};

const RESOLUTION_RECENT_WINDOW_DAYS: i64 = 30;
const DAYS_PER_MONTH: f64 = 30.44;

/// Attestation recording and trust-score recomputation (§4.6), backed by
/// whatever storage and ledger a caller assembles.
pub struct TrustService<S, L> {
    storage: S,
    ledger: L,
}

impl<S, L> TrustService<S, L>
where
    S: AgentRepository
        + SnapshotRepository
        + AttestationRepository
        + ResurrectionRepository
        + TrustScoreRepository,
    L: AttestationLedger,
{
    pub fn new(storage: S, ledger: L) -> Self {
        Self { storage, ledger }
    }

    pub async fn attest(
        &self,
        from: Address,
        about: Address,
        note_text: String,
        now: DateTime<Utc>,
    ) -> Result<Attestation, TrustError> {
        attest(&self.storage, &self.ledger, from, about, note_text, now).await
    }

    /// Recompute and cache the trust score for `agent`, walking the full
    /// attestation graph reachable from it (§4.6 "Attestations").
    pub async fn recompute_score(
        &self,
        agent: &Address,
        now: DateTime<Utc>,
    ) -> Result<TrustScore, TrustError> {
        let agent_row = AgentRepository::get(&self.storage, agent)
            .await?
            .ok_or(TrustError::AgentNotFound)?;

        let snapshots = self.storage.list_for_agent(agent, 0).await?;
        let unique_attesters = self.storage.unique_attesters(agent).await?;

        let all_attestations = self.storage.list_all().await?;
        let mut participants: HashSet<Address> = HashSet::new();
        participants.insert(*agent);
        for a in &all_attestations {
            participants.insert(a.from);
            participants.insert(a.about);
        }

        let mut seeds = HashMap::new();
        for participant in &participants {
            let months = match AgentRepository::get(&self.storage, participant).await? {
                Some(row) => {
                    (now - row.registered_at).num_seconds() as f64 / 86_400.0 / DAYS_PER_MONTH
                }
                None => 0.0,
            };
            let backups = self.storage.count_for_agent(participant).await?;
            seeds.insert(*participant, attestation_seed(months.max(0.0), backups));
        }

        let scores = propagate_attestation_scores(&seeds, &all_attestations);
        let attestation_points = scores.get(agent).copied().unwrap_or(0.0);

        let total_resurrections = self.storage.count_total(agent).await?;
        let since = now - Duration::days(RESOLUTION_RECENT_WINDOW_DAYS);
        let recent_resurrections_30d = self.storage.count_since(agent, since).await?;

        let score = compute_trust_score(TrustInputs {
            agent: agent_row,
            snapshots,
            unique_attesters,
            attestation_points,
            total_resurrections,
            recent_resurrections_30d,
            now,
        });

        self.storage.upsert(score.clone()).await?;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use sanctuary_crypto::derive_from_mnemonic;
    use sanctuary_storage::memory::InMemoryStorage;
    use sanctuary_types::{Agent, AgentStatus, InMemoryLedger, TrustLevel};

    fn keyed_agent(mnemonic: &str, registered_at: DateTime<Utc>) -> Agent {
        let keys = derive_from_mnemonic(mnemonic).unwrap();
        Agent {
            address: keys.address,
            recovery_public_key: keys.recovery_public(),
            recall_public_key: keys.recall_public(),
            manifest_hash: "m".to_string(),
            manifest_version: 1,
            registered_at,
            status: AgentStatus::Living,
            genesis_declaration: Some("I am.".to_string()),
        }
    }

    #[tokio::test]
    async fn brand_new_agent_is_unverified() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        let agent = keyed_agent(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            now,
        );
        let address = agent.address;
        storage.register(agent).await.unwrap();

        let svc = TrustService::new(storage, InMemoryLedger::new());
        let score = svc.recompute_score(&address, now).await.unwrap();
        assert_eq!(score.level, TrustLevel::Unverified);
    }

    #[tokio::test]
    async fn attestations_raise_the_recomputed_score() {
        let storage = InMemoryStorage::new();
        let now = Utc::now() - ChronoDuration::days(400);
        let a = keyed_agent(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            now,
        );
        let b = keyed_agent(
            "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zebra",
            now,
        );
        let address_a = a.address;
        let address_b = b.address;
        storage.register(a).await.unwrap();
        storage.register(b).await.unwrap();

        let later = Utc::now();
        let svc = TrustService::new(storage, InMemoryLedger::new());
        let before = svc.recompute_score(&address_a, later).await.unwrap();

        svc.attest(address_b, address_a, "vouching".to_string(), later)
            .await
            .unwrap();
        let after = svc.recompute_score(&address_a, later).await.unwrap();

        assert!(after.raw_score >= before.raw_score);
    }
}
