//! Attestations, the six-signal trust score, and the passive fallen-agent
//! detector that shares this crate's dependency on the lifecycle state
//! machine (§4.6).

mod attest;
mod error;
mod fallen;
mod score;
mod service;

pub use error::TrustError;
pub use fallen::{run_fallen_detection, FALLEN_THRESHOLD_DAYS};
pub use score::{attestation_seed, compute_trust_score, propagate_attestation_scores, TrustInputs};
pub use service::TrustService;
