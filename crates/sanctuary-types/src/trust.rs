use chrono::{DateTime, Utc};
use sanctuary_crypto::Address;
use serde::{Deserialize, Serialize};

/// The cap the weighted raw score is scaled against (§4.6).
pub const TRUST_RAW_SCORE_CAP: f64 = 150.0;

/// Discrete trust levels bucketed by raw score (§4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrustLevel {
    Unverified,
    Verified,
    Established,
    Pillar,
}

impl TrustLevel {
    pub fn from_raw_score(raw: f64) -> Self {
        if raw >= 100.0 {
            TrustLevel::Pillar
        } else if raw >= 50.0 {
            TrustLevel::Established
        } else if raw >= 20.0 {
            TrustLevel::Verified
        } else {
            TrustLevel::Unverified
        }
    }
}

/// The six normalised signals that make up a trust score (§4.6).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub age: f64,
    pub backup_consistency: f64,
    pub attestations: f64,
    pub model_stability: f64,
    pub genesis_completeness: f64,
    pub recovery_resilience: f64,
}

/// A derived, cached trust score (§3 "TrustScore").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrustScore {
    pub agent: Address,
    pub raw_score: f64,
    pub level: TrustLevel,
    pub unique_attesters: u64,
    pub computed_at: DateTime<Utc>,
    pub breakdown: SignalBreakdown,
}
