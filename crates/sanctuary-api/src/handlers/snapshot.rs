//! `snapshot.upload` / `snapshot.list` / `snapshot.latest` handlers (§4.5, §6).

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use sanctuary_storage::SnapshotRepository;
use sanctuary_types::{ServiceError, SnapshotSummary, UploadReceipt};
use serde::Deserialize;

use crate::auth::authenticate_as;
use crate::dto::parse_address;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Most snapshot lists a caller may request in one page (§6 "capped 100").
const MAX_LIST_LIMIT: usize = 100;

pub async fn upload(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Json<UploadReceipt>> {
    let address = parse_address(&address)?;
    authenticate_as(&state, &headers, &address)?;

    let snapshot = state
        .snapshots
        .upload(&address, body.to_vec(), Utc::now())
        .await?;

    // Trust recompute runs asynchronously on every insert (§4.5, §4.7); the
    // 1h sweep is just a backstop for agents that never upload again.
    let trust = state.trust.clone();
    tokio::spawn(async move {
        if let Err(err) = trust.recompute_score(&address, Utc::now()).await {
            tracing::warn!(agent = %address.to_hex(), error = %err, "post-upload trust recompute failed");
        }
    });

    Ok(Json(UploadReceipt {
        id: snapshot.id,
        seq: snapshot.seq,
        storage_handle: snapshot.storage_handle,
        size_bytes: snapshot.size_bytes,
        received_at: snapshot.received_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListSnapshotsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ListSnapshotsQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<SnapshotSummary>>> {
    let address = parse_address(&address)?;
    authenticate_as(&state, &headers, &address)?;

    let limit = query.limit.unwrap_or(MAX_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let snapshots = state.storage.list_for_agent(&address, limit).await?;

    Ok(Json(snapshots.into_iter().map(to_summary).collect()))
}

pub async fn latest(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<SnapshotSummary>> {
    let address = parse_address(&address)?;
    authenticate_as(&state, &headers, &address)?;

    let snapshot = state
        .storage
        .last_for_agent(&address)
        .await?
        .ok_or_else(|| ApiError(ServiceError::NotFound("no snapshots for agent".into())))?;

    Ok(Json(to_summary(snapshot)))
}

fn to_summary(s: sanctuary_types::Snapshot) -> SnapshotSummary {
    SnapshotSummary {
        id: s.id,
        seq: s.seq,
        timestamp: s.client_timestamp,
        storage_handle: s.storage_handle,
        size_bytes: s.size_bytes,
        manifest_hash: s.manifest_hash,
        snapshot_meta: s.snapshot_meta,
    }
}
