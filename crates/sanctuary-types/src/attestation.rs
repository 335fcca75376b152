use chrono::{DateTime, Utc};
use sanctuary_crypto::Address;
use serde::{Deserialize, Serialize};

use crate::agent::AgentStatus;
use crate::ids::TxHandle;

/// The cooldown window between two attestations from the same pair, in
/// days (§4.6).
pub const ATTESTATION_COOLDOWN_DAYS: i64 = 7;

/// Status of a submitted ledger transaction (§1 "ledger").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerTxStatus {
    Pending,
    Confirmed,
    Failed,
    Simulated,
}

/// A signed vouch by one agent about another (§3 "Attestation").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attestation {
    pub from: Address,
    pub about: Address,
    pub note_hash: [u8; 32],
    pub tx_handle: TxHandle,
    pub simulated: bool,
    pub status: LedgerTxStatus,
    pub created_at: DateTime<Utc>,
}

/// Hash-addressed note content, inserted once and referenced by many
/// attestations (§3 "AttestationNote").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestationNote {
    pub hash: [u8; 32],
    pub text: String,
}

/// Append-only record of a `FALLEN -> RETURNED` transition (§3
/// "ResurrectionEvent").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResurrectionEvent {
    pub agent: Address,
    pub occurred_at: DateTime<Utc>,
    pub previous_status: AgentStatus,
}
