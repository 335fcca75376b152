//! `heartbeat` handler (§4.6 "Fallen detection", §6).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use sanctuary_crypto::{recover_address, Preimage};
use sanctuary_storage::HeartbeatRepository;
use sanctuary_types::ServiceError;
use serde::{Deserialize, Serialize};

use crate::auth::authenticate_as;
use crate::dto::{parse_address, parse_signature};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Domain-separation tag for the heartbeat preimage (§4.1): proves the
/// caller held `agentSecret` at the stated timestamp, independent of the
/// bearer token presented alongside it.
pub const HEARTBEAT_TAG: &str = "sanctuary-heartbeat-v1";

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub timestamp: DateTime<Utc>,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub recorded_at: DateTime<Utc>,
}

pub async fn record(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
    Json(req): Json<HeartbeatRequest>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let address = parse_address(&address)?;
    authenticate_as(&state, &headers, &address)?;

    let signature = parse_signature(&req.signature)?;
    let digest = Preimage::new(HEARTBEAT_TAG)
        .field_str(&address.to_hex())
        .field_i64(req.timestamp.timestamp())
        .digest();
    let recovered = recover_address(&digest, &signature)
        .map_err(|_| ApiError(ServiceError::InvalidInput("signature invalid".into())))?;
    if recovered != address {
        return Err(ApiError(ServiceError::InvalidInput(
            "signature invalid".into(),
        )));
    }

    let now = Utc::now();
    state.storage.record(&address, now).await?;

    Ok(Json(HeartbeatResponse { recorded_at: now }))
}
