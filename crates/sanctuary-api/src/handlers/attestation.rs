//! `attestation.submit` handler (§4.6, §6).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use sanctuary_crypto::{keccak256, recover_address, Preimage};
use sanctuary_types::{LedgerTxStatus, ServiceError};
use serde::{Deserialize, Serialize};

use crate::auth::authenticate_as;
use crate::dto::{parse_address, parse_signature};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Domain-separation tag for the attestation-submission preimage (§4.1):
/// proves `from` controls the signing key independent of the bearer token,
/// since a note is forwarded to an external ledger.
pub const ATTESTATION_SUBMIT_TAG: &str = "sanctuary-attestation-submit-v1";

#[derive(Debug, Deserialize)]
pub struct SubmitAttestationRequest {
    pub from: String,
    pub about: String,
    pub note_hash: String,
    pub deadline: DateTime<Utc>,
    pub signature: String,
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitAttestationResponse {
    pub tx_handle: String,
    pub status: LedgerTxStatus,
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubmitAttestationRequest>,
) -> ApiResult<Json<SubmitAttestationResponse>> {
    let from = parse_address(&req.from)?;
    let about = parse_address(&req.about)?;
    authenticate_as(&state, &headers, &from)?;

    let now = Utc::now();
    if req.deadline <= now {
        return Err(ApiError(ServiceError::InvalidInput(
            "deadline has passed".into(),
        )));
    }

    let note_hash = keccak256(req.note.as_bytes());
    let claimed_hash = hex::decode(&req.note_hash)
        .map_err(|_| ApiError(ServiceError::InvalidInput("noteHash is not valid hex".into())))?;
    if claimed_hash != note_hash {
        return Err(ApiError(ServiceError::InvalidInput(
            "noteHash does not match note".into(),
        )));
    }

    let signature = parse_signature(&req.signature)?;
    let digest = Preimage::new(ATTESTATION_SUBMIT_TAG)
        .field_str(&from.to_hex())
        .field_str(&about.to_hex())
        .field(&note_hash)
        .field_i64(req.deadline.timestamp())
        .digest();
    let recovered = recover_address(&digest, &signature)
        .map_err(|_| ApiError(ServiceError::InvalidInput("signature invalid".into())))?;
    if recovered != from {
        return Err(ApiError(ServiceError::InvalidInput(
            "signature invalid".into(),
        )));
    }

    let attestation = state.trust.attest(from, about, req.note, now).await?;

    Ok(Json(SubmitAttestationResponse {
        tx_handle: attestation.tx_handle.0,
        status: attestation.status,
    }))
}
