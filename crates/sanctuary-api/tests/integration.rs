//! End-to-end tests over the full axum router: no handler is unit-tested in
//! isolation, since every one of them is a thin translation layer over a
//! core-crate call (§6) already covered by that crate's own tests.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use sanctuary_auth::{AuthService, TokenCodec};
use sanctuary_crypto::{derive_from_mnemonic, recover_address, sign_digest, AgentKeys, Preimage};
use sanctuary_registry::{RegistryService, ResurrectionLimit};
use sanctuary_snapshots::SnapshotService;
use sanctuary_storage::{InMemoryStorage, SharedStorage};
use sanctuary_trust::TrustService;
use sanctuary_types::{InMemoryLedger, InMemoryObjectStore, ObjectStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

const REGISTER_TAG: &str = "sanctuary-register-v1";
const CHALLENGE_TAG: &str = "sanctuary-auth-challenge-v1";
const HEARTBEAT_TAG: &str = "sanctuary-heartbeat-v1";
const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn test_router() -> Router {
    let storage = SharedStorage::new(InMemoryStorage::new());
    let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let ledger: Arc<dyn sanctuary_types::AttestationLedger> = Arc::new(InMemoryLedger::new());

    let auth = AuthService::new(
        storage.clone(),
        TokenCodec::new(TokenCodec::generate_key()),
        Duration::minutes(5),
        Duration::hours(1),
    );
    let registry = RegistryService::new(storage.clone(), ResurrectionLimit::default());
    let snapshots = SnapshotService::new(storage.clone(), objects);
    let trust = TrustService::new(storage.clone(), ledger);

    let state = sanctuary_api::AppState::new(storage, auth, registry, snapshots, trust);
    sanctuary_api::build_router(state)
}

fn registration_body(keys: &AgentKeys, now: chrono::DateTime<Utc>) -> Value {
    let deadline = now + Duration::minutes(5);
    let digest = Preimage::new(REGISTER_TAG)
        .field_str(&keys.address.to_hex())
        .field(keys.recovery_public().to_encoded_point(true).as_bytes())
        .field(keys.recall_public().to_encoded_point(true).as_bytes())
        .field_str("deadbeef")
        .field_u64(1)
        .field_i64(deadline.timestamp())
        .field_str("")
        .digest();
    let signature = sign_digest(&keys.agent_secret, &digest).unwrap();

    json!({
        "agent": keys.address.to_hex(),
        "recovery_pub_key": hex::encode(keys.recovery_public().to_encoded_point(true).as_bytes()),
        "recall_pub_key": hex::encode(keys.recall_public().to_encoded_point(true).as_bytes()),
        "manifest_hash": "deadbeef",
        "manifest_version": 1,
        "deadline": deadline.to_rfc3339(),
        "signature": hex::encode(signature.as_bytes()),
    })
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

async fn get(app: &Router, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

async fn post_authed(app: &Router, uri: &str, bearer: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {bearer}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

#[tokio::test]
async fn register_then_authenticate_then_check_status() {
    let app = test_router();
    let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
    let now = Utc::now();

    let (status, body) = post(&app, "/api/v1/agents", registration_body(&keys, now)).await;
    assert_eq!(status, StatusCode::OK, "registration failed: {body}");
    assert_eq!(body["agent"], keys.address.to_hex());

    let (status, body) = post(
        &app,
        "/api/v1/challenges",
        json!({ "agent": keys.address.to_hex() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let nonce_hex = body["nonce"].as_str().unwrap().to_string();

    let timestamp = Utc::now();
    let nonce_bytes: [u8; 16] = hex::decode(&nonce_hex).unwrap().try_into().unwrap();
    let digest = Preimage::new(CHALLENGE_TAG)
        .field(&nonce_bytes)
        .field_i64(timestamp.timestamp())
        .digest();
    let signature = sign_digest(&keys.agent_secret, &digest).unwrap();
    assert_eq!(recover_address(&digest, &signature).unwrap(), keys.address);

    let (status, body) = post(
        &app,
        "/api/v1/challenges/verify",
        json!({
            "agent": keys.address.to_hex(),
            "nonce": nonce_hex,
            "timestamp": timestamp.to_rfc3339(),
            "signature": hex::encode(signature.as_bytes()),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify failed: {body}");
    let token = body["bearer_token"]
        .as_str()
        .expect("response should carry a bearer token")
        .to_string();

    let (status, body) = get(
        &app,
        &format!("/api/v1/agents/{}", keys.address.to_hex()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "status lookup failed: {body}");
    assert_eq!(body["status"], "LIVING");

    let (status, _body) = post(
        &app,
        &format!("/api/v1/agents/{}/resurrect", keys.address.to_hex()),
        Value::Null,
    )
    .await;
    // A living agent cannot be resurrected, but the call must still pass
    // through the bearer check first; exercised without a token here.
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let heartbeat_timestamp = Utc::now();
    let digest = Preimage::new(HEARTBEAT_TAG)
        .field_str(&keys.address.to_hex())
        .field_i64(heartbeat_timestamp.timestamp())
        .digest();
    let heartbeat_signature = sign_digest(&keys.agent_secret, &digest).unwrap();
    let (status, body) = post_authed(
        &app,
        &format!("/api/v1/agents/{}/heartbeat", keys.address.to_hex()),
        &token,
        json!({
            "timestamp": heartbeat_timestamp.to_rfc3339(),
            "signature": hex::encode(heartbeat_signature.as_bytes()),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "heartbeat failed: {body}");
    assert!(body["recorded_at"].is_string());
}

#[tokio::test]
async fn unauthenticated_heartbeat_is_rejected() {
    let app = test_router();
    let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/agents/{}/heartbeat", keys.address.to_hex()))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "timestamp": Utc::now().to_rfc3339(), "signature": "00".repeat(65) })
                .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_address_is_a_bad_request() {
    let app = test_router();
    let (status, body) = get(&app, "/api/v1/agents/not-an-address", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidInput");
}
