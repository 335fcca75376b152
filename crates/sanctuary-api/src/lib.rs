//! The axum HTTP surface binding challenge, registry, snapshot, attestation
//! and heartbeat operations (§6) to the core crates, with one error-mapping
//! boundary (§7) and one bearer-auth extractor shared across handlers.

mod auth;
mod dto;
mod error;
mod handlers;
mod router;
mod state;

pub use auth::{authenticate, authenticate_as};
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
