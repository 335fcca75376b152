use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sanctuary_types::ServiceError;
use serde::Serialize;
use thiserror::Error;

/// Every inner crate's error converges here as a [`ServiceError`] (§7);
/// this is the one place that turns a kind into an HTTP status.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(pub ServiceError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl From<sanctuary_auth::AuthError> for ApiError {
    fn from(e: sanctuary_auth::AuthError) -> Self {
        use sanctuary_auth::AuthError as E;
        let mapped = match e {
            E::ChallengeMissing => ServiceError::AuthInvalid("challenge missing".into()),
            E::ChallengeExpired => ServiceError::AuthInvalid("challenge expired".into()),
            E::ChallengeConsumed => ServiceError::AuthInvalid("challenge already consumed".into()),
            E::SignatureInvalid => ServiceError::AuthInvalid("signature invalid".into()),
            E::TokenInvalid => ServiceError::AuthInvalid("token invalid".into()),
            E::TokenExpired => ServiceError::AuthInvalid("token expired".into()),
            E::AgentMismatch => ServiceError::Forbidden("agent mismatch".into()),
            E::Storage(inner) => storage_to_service(inner),
        };
        Self(mapped)
    }
}

impl From<sanctuary_registry::RegistryError> for ApiError {
    fn from(e: sanctuary_registry::RegistryError) -> Self {
        use sanctuary_registry::RegistryError as E;
        let mapped = match e {
            E::AgentExists => ServiceError::Conflict("agent already registered".into()),
            E::DeadlineExpired => ServiceError::InvalidInput("deadline has passed".into()),
            E::SignatureInvalid => ServiceError::InvalidInput("signature invalid".into()),
            E::GenesisTooLong(max) => {
                ServiceError::InvalidInput(format!("genesis declaration exceeds {max} bytes"))
            }
            E::NotFound => ServiceError::NotFound("agent not found".into()),
            E::NotFallen => ServiceError::Conflict("agent is not fallen".into()),
            E::ResurrectionRateLimited => {
                ServiceError::Conflict("resurrection rate limit exceeded".into())
            }
            E::Storage(inner) => storage_to_service(inner),
        };
        Self(mapped)
    }
}

impl From<sanctuary_snapshots::SnapshotError> for ApiError {
    fn from(e: sanctuary_snapshots::SnapshotError) -> Self {
        use sanctuary_snapshots::SnapshotError as E;
        let mapped = match e {
            E::AgentMismatch => ServiceError::Forbidden("header agent mismatch".into()),
            E::SignatureInvalid => ServiceError::Corrupted("header signature invalid".into()),
            E::PayloadEmpty => ServiceError::InvalidInput("payload is empty".into()),
            E::PayloadTooLarge(max) => {
                ServiceError::InvalidInput(format!("payload exceeds {max} bytes"))
            }
            E::AgentNotWritable => ServiceError::Forbidden("agent not writable".into()),
            E::RateLimited => ServiceError::Conflict("daily snapshot limit reached".into()),
            E::MetaTooLarge(max) => {
                ServiceError::InvalidInput(format!("snapshot metadata exceeds {max} bytes"))
            }
            E::AgentNotFound => ServiceError::NotFound("agent not found".into()),
            E::Codec(inner) => ServiceError::Corrupted(inner.to_string()),
            E::Storage(inner) => storage_to_service(inner),
            E::ObjectStoreUnavailable(msg) => ServiceError::ExternalUnavailable(msg),
        };
        Self(mapped)
    }
}

impl From<sanctuary_trust::TrustError> for ApiError {
    fn from(e: sanctuary_trust::TrustError) -> Self {
        use sanctuary_trust::TrustError as E;
        let mapped = match e {
            E::SelfAttestation => ServiceError::InvalidInput("cannot attest about self".into()),
            E::CooldownActive => ServiceError::Conflict("attestation cooldown active".into()),
            E::AgentNotFound => ServiceError::NotFound("agent not found".into()),
            E::Ledger(msg) => ServiceError::ExternalUnavailable(msg),
            E::Storage(inner) => storage_to_service(inner),
        };
        Self(mapped)
    }
}

impl From<sanctuary_storage::StorageError> for ApiError {
    fn from(e: sanctuary_storage::StorageError) -> Self {
        Self(storage_to_service(e))
    }
}

fn storage_to_service(e: sanctuary_storage::StorageError) -> ServiceError {
    use sanctuary_storage::StorageError as E;
    match e {
        E::NotFound(msg) => ServiceError::NotFound(msg),
        E::Conflict(msg) => ServiceError::Conflict(msg),
        E::InvalidInput(msg) => ServiceError::InvalidInput(msg),
        E::Serialization(msg) => ServiceError::Internal(msg),
        E::Backend(msg) => ServiceError::ExternalUnavailable(msg),
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::AuthRequired => StatusCode::UNAUTHORIZED,
            ServiceError::AuthInvalid(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::ExternalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Corrupted(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}
