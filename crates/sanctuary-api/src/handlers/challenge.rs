//! `challenge.create` / `challenge.verify` handlers (§4.3, §6).

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use sanctuary_types::{ChallengeNonce, ServiceError};
use serde::{Deserialize, Serialize};

use crate::dto::{parse_address, parse_signature};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChallengeRequest {
    pub agent: String,
}

#[derive(Debug, Serialize)]
pub struct CreateChallengeResponse {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateChallengeRequest>,
) -> ApiResult<Json<CreateChallengeResponse>> {
    let agent = parse_address(&req.agent)?;
    let (nonce, expires_at) = state.auth.issue_challenge(agent, Utc::now()).await?;
    Ok(Json(CreateChallengeResponse {
        nonce: nonce.to_hex(),
        expires_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyChallengeRequest {
    pub agent: String,
    pub nonce: String,
    pub timestamp: DateTime<Utc>,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyChallengeResponse {
    pub bearer_token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyChallengeRequest>,
) -> ApiResult<Json<VerifyChallengeResponse>> {
    let agent = parse_address(&req.agent)?;
    let nonce = ChallengeNonce::from_hex(&req.nonce)
        .ok_or_else(|| ApiError(ServiceError::InvalidInput("malformed nonce".into())))?;
    let signature = parse_signature(&req.signature)?;

    let issued = state
        .auth
        .verify_challenge(agent, nonce, req.timestamp, signature, Utc::now())
        .await?;

    Ok(Json(VerifyChallengeResponse {
        bearer_token: issued.bearer_token,
        expires_at: issued.expires_at,
    }))
}
