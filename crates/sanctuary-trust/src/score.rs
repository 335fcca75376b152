use chrono::{DateTime, Utc};
use sanctuary_crypto::Address;
use sanctuary_types::{
    Agent, Attestation, LedgerTxStatus, Snapshot, SignalBreakdown, TrustLevel, TrustScore,
    TRUST_RAW_SCORE_CAP,
};
use std::collections::{HashMap, HashSet};

const DAYS_PER_MONTH: f64 = 30.44;

/// Per-participant seed for the attestation propagation (§4.6): age in
/// months plus half a point per backup, capped at 100 backups.
pub fn attestation_seed(months_since_registration: f64, backup_count: u64) -> f64 {
    months_since_registration + 0.5 * (backup_count.min(100) as f64)
}

/// Three rounds of attestation propagation over the whole graph: each
/// agent gains `0.1 * Σ(attester's current score)` over its unique
/// attesters, with mutual pairs weighted `0.5` (§4.6 "Attestations").
/// `failed` ledger submissions never count as a live attestation edge.
pub fn propagate_attestation_scores(
    seeds: &HashMap<Address, f64>,
    attestations: &[Attestation],
) -> HashMap<Address, f64> {
    let edges: HashSet<(Address, Address)> = attestations
        .iter()
        .filter(|a| a.status != LedgerTxStatus::Failed)
        .map(|a| (a.from, a.about))
        .collect();

    let mut scores = seeds.clone();
    for _ in 0..3 {
        let snapshot = scores.clone();
        for about in seeds.keys() {
            let attesters: HashSet<&Address> = edges
                .iter()
                .filter(|(_, a)| a == about)
                .map(|(from, _)| from)
                .collect();
            let gain: f64 = attesters
                .iter()
                .map(|from| {
                    let weight = if edges.contains(&(*about, **from)) {
                        0.5
                    } else {
                        1.0
                    };
                    weight * snapshot.get(*from).copied().unwrap_or(0.0)
                })
                .sum();
            *scores.get_mut(about).unwrap() += 0.1 * gain;
        }
    }
    scores
}

/// Everything `compute_trust_score` needs for one agent, already gathered
/// from storage and the propagation pass above.
pub struct TrustInputs {
    pub agent: Agent,
    pub snapshots: Vec<Snapshot>,
    pub unique_attesters: u64,
    pub attestation_points: f64,
    pub total_resurrections: u64,
    pub recent_resurrections_30d: u64,
    pub now: DateTime<Utc>,
}

/// The six weighted signals, combined into one raw score and bucketed
/// level (§4.6).
pub fn compute_trust_score(inputs: TrustInputs) -> TrustScore {
    let TrustInputs {
        agent,
        mut snapshots,
        unique_attesters,
        attestation_points,
        total_resurrections,
        recent_resurrections_30d,
        now,
    } = inputs;

    snapshots.sort_by_key(|s| s.received_at);

    let age_days = (now - agent.registered_at).num_seconds() as f64 / 86_400.0;
    let age = (age_days / DAYS_PER_MONTH / 12.0).clamp(0.0, 1.0);

    let backup_consistency = if age_days < 1.0 {
        0.0
    } else {
        backup_consistency_signal(&snapshots, age_days)
    };

    let attestations = (attestation_points / TRUST_RAW_SCORE_CAP).clamp(0.0, 1.0);

    let model_stability = model_stability_signal(&snapshots);

    let genesis_completeness = 0.4 * agent.genesis_declaration.is_some() as u8 as f64
        + 0.3 * !snapshots.is_empty() as u8 as f64
        + 0.3 * (unique_attesters > 0) as u8 as f64;

    let recovery_resilience = (0.5
        + 0.25 * (total_resurrections.min(2) as f64)
        - 0.2 * (recent_resurrections_30d as i64 - 3).max(0) as f64)
        .clamp(0.0, 1.0);

    let breakdown = SignalBreakdown {
        age,
        backup_consistency,
        attestations,
        model_stability,
        genesis_completeness,
        recovery_resilience,
    };

    let raw_score = (breakdown.age * 0.20
        + breakdown.backup_consistency * 0.25
        + breakdown.attestations * 0.30
        + breakdown.model_stability * 0.10
        + breakdown.genesis_completeness * 0.05
        + breakdown.recovery_resilience * 0.10)
        * TRUST_RAW_SCORE_CAP;

    TrustScore {
        agent: agent.address,
        raw_score,
        level: TrustLevel::from_raw_score(raw_score),
        unique_attesters,
        computed_at: now,
        breakdown,
    }
}

/// Collapse consecutive snapshots with an identical manifest hash to one,
/// compare the meaningful count against one expected upload per elapsed
/// day, and penalise gaps longer than a week.
fn backup_consistency_signal(snapshots: &[Snapshot], age_days: f64) -> f64 {
    if snapshots.is_empty() {
        return 0.0;
    }

    let mut meaningful: Vec<&Snapshot> = Vec::new();
    for snapshot in snapshots {
        match meaningful.last() {
            Some(prev) if prev.manifest_hash == snapshot.manifest_hash => {}
            _ => meaningful.push(snapshot),
        }
    }

    let expected = age_days.max(1.0);
    let ratio = (meaningful.len() as f64 / expected).min(1.0);

    let gaps = meaningful
        .windows(2)
        .filter(|pair| (pair[1].received_at - pair[0].received_at).num_days() > 7)
        .count();

    (ratio - 0.1 * gaps as f64).clamp(0.0, 1.0)
}

/// Fraction of snapshots (as a proxy for lifetime) reporting whatever
/// model the most recent snapshot reports; neutral when no snapshot ever
/// carried `snapshotMeta.model` (§4.6 "Model stability").
fn model_stability_signal(snapshots: &[Snapshot]) -> f64 {
    let models: Vec<&str> = snapshots
        .iter()
        .filter_map(|s| s.snapshot_meta.as_ref()?.model.as_deref())
        .collect();
    if models.is_empty() {
        return 0.5;
    }
    let current = models[models.len() - 1];
    let matching = models.iter().filter(|m| **m == current).count();
    matching as f64 / models.len() as f64
}
