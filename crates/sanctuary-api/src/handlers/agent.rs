//! `agent.register` / `agent.status` / `agent.resurrect` handlers (§4.4, §6).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use sanctuary_registry::RegisterRequest;
use sanctuary_storage::{
    AttestationRepository, HeartbeatRepository, ResurrectionRepository, SnapshotRepository,
    TrustScoreRepository,
};
use sanctuary_types::{
    AgentStatusSummary, IdentitySummary, ResurrectionManifest, SnapshotSummary, TrustLevel,
    TrustScore,
};
use serde::{Deserialize, Serialize};

use crate::auth::authenticate_as;
use crate::dto::{parse_address, parse_public_key, parse_signature};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub agent: String,
    pub recovery_pub_key: String,
    pub recall_pub_key: String,
    pub manifest_hash: String,
    pub manifest_version: u32,
    pub deadline: DateTime<Utc>,
    pub signature: String,
    #[serde(default)]
    pub genesis_declaration: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterAgentResponse {
    pub agent: String,
    pub registered_at: DateTime<Utc>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> ApiResult<Json<RegisterAgentResponse>> {
    let request = RegisterRequest {
        agent: parse_address(&req.agent)?,
        recovery_public_key: parse_public_key(&req.recovery_pub_key)?,
        recall_public_key: parse_public_key(&req.recall_pub_key)?,
        manifest_hash: req.manifest_hash,
        manifest_version: req.manifest_version,
        deadline: req.deadline,
        signature: parse_signature(&req.signature)?,
        genesis_declaration: req.genesis_declaration,
    };

    let agent = state.registry.register(request, Utc::now()).await?;
    Ok(Json(RegisterAgentResponse {
        agent: agent.address.to_hex(),
        registered_at: agent.registered_at,
    }))
}

pub async fn status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<AgentStatusSummary>> {
    let address = parse_address(&address)?;
    let agent = state.registry.status(&address).await?;

    let score = trust_score_or_default(&state, &address).await?;
    let backup_count = state.storage.count_for_agent(&address).await?;
    let last_heartbeat = state.storage.last(&address).await?;
    let attestations_received = state.storage.count_received(&address).await?;

    Ok(Json(AgentStatusSummary {
        address: agent.address.to_hex(),
        status: agent.status,
        trust_score: score.raw_score,
        trust_level: score.level,
        backup_count,
        last_heartbeat,
        attestations_received,
    }))
}

pub async fn resurrect(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<ResurrectionManifest>> {
    let address = parse_address(&address)?;
    authenticate_as(&state, &headers, &address)?;

    let now = Utc::now();
    let result = state.registry.resurrect(&address, now).await?;
    let score = trust_score_or_default(&state, &address).await?;
    let resurrection_count = state.storage.count_total(&address).await?;
    let attestation_count = state.storage.count_received(&address).await?;
    let last_heartbeat = state.storage.last(&address).await?;

    let last_backup = result.snapshots.first().map(|s| s.received_at);
    let total_snapshots = result.snapshots.len() as u64;

    let snapshots = result
        .snapshots
        .into_iter()
        .map(|s| SnapshotSummary {
            id: s.id,
            seq: s.seq,
            timestamp: s.client_timestamp,
            storage_handle: s.storage_handle,
            size_bytes: s.size_bytes,
            manifest_hash: s.manifest_hash,
            snapshot_meta: s.snapshot_meta,
        })
        .collect();

    Ok(Json(ResurrectionManifest {
        identity: IdentitySummary {
            address: result.agent.address,
            trust_score: score.raw_score,
            trust_level: score.level,
            attestation_count,
            registered_at: result.agent.registered_at,
            last_backup,
            last_heartbeat,
            total_snapshots,
            resurrection_count,
        },
        snapshots,
        genesis_declaration: result.agent.genesis_declaration.clone(),
        status: result.agent.status,
        previous_status: result.previous_status,
    }))
}

async fn trust_score_or_default(
    state: &AppState,
    address: &sanctuary_crypto::Address,
) -> Result<TrustScore, ApiError> {
    match state.storage.get(address).await? {
        Some(score) => Ok(score),
        None => Ok(TrustScore {
            agent: *address,
            raw_score: 0.0,
            level: TrustLevel::Unverified,
            unique_attesters: 0,
            computed_at: Utc::now(),
            breakdown: Default::default(),
        }),
    }
}
