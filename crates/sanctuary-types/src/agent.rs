use chrono::{DateTime, Utc};
use sanctuary_crypto::{Address, PublicKey};
use serde::{Deserialize, Serialize};

/// The maximum size, in bytes, of a genesis declaration (§3 "Agent").
pub const MAX_GENESIS_DECLARATION_BYTES: usize = 2000;

/// Status in the agent lifecycle state machine (§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Living,
    Fallen,
    Returned,
}

impl AgentStatus {
    /// `LIVING` and `RETURNED` both permit snapshot upload and attestation
    /// issuance; only `FALLEN` is passive (§4.4).
    pub fn is_writable(&self) -> bool {
        matches!(self, AgentStatus::Living | AgentStatus::Returned)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Living => "LIVING",
            AgentStatus::Fallen => "FALLEN",
            AgentStatus::Returned => "RETURNED",
        };
        write!(f, "{s}")
    }
}

/// An agent's identity anchor (§3 "Agent"). Created once at registration;
/// only `status` mutates afterward.
#[derive(Clone, Serialize, Deserialize)]
pub struct Agent {
    pub address: Address,
    #[serde(with = "recovery_pub_serde")]
    pub recovery_public_key: PublicKey,
    #[serde(with = "recovery_pub_serde")]
    pub recall_public_key: PublicKey,
    pub manifest_hash: String,
    pub manifest_version: u32,
    pub registered_at: DateTime<Utc>,
    pub status: AgentStatus,
    pub genesis_declaration: Option<String>,
}

mod recovery_pub_serde {
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use sanctuary_crypto::PublicKey;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &PublicKey, s: S) -> Result<S::Ok, S::Error> {
        let bytes = key.to_encoded_point(true);
        s.serialize_str(&hex::encode(bytes.as_bytes()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        PublicKey::from_sec1_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Public summary returned by `agent.status` (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentStatusSummary {
    pub address: String,
    pub status: AgentStatus,
    pub trust_score: f64,
    pub trust_level: super::trust::TrustLevel,
    pub backup_count: u64,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub attestations_received: u64,
}
