use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the full axum router: one route per §6 operation, nested under
/// `/api/v1`, with tracing and a permissive CORS layer (§7 propagation
/// policy is enforced inside handlers, not at this layer).
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/challenges", post(handlers::challenge::create))
        .route("/challenges/verify", post(handlers::challenge::verify))
        .route("/agents", post(handlers::agent::register))
        .route("/agents/:address", get(handlers::agent::status))
        .route(
            "/agents/:address/resurrect",
            post(handlers::agent::resurrect),
        )
        .route(
            "/agents/:address/snapshots",
            post(handlers::snapshot::upload).get(handlers::snapshot::list),
        )
        .route(
            "/agents/:address/snapshots/latest",
            get(handlers::snapshot::latest),
        )
        .route(
            "/agents/:address/heartbeat",
            post(handlers::heartbeat::record),
        )
        .route("/attestations", post(handlers::attestation::submit));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
