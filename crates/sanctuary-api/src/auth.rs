use axum::http::HeaderMap;
use sanctuary_crypto::Address;
use sanctuary_types::ServiceError;

use crate::error::ApiError;
use crate::state::AppState;

/// Pull the bearer token out of `Authorization: Bearer <token>` and resolve
/// it to the agent it was issued to (§4.3).
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Address, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(ServiceError::AuthRequired))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError(ServiceError::AuthRequired))?;

    state
        .auth
        .verify_token(token, chrono::Utc::now())
        .map_err(ApiError::from)
}

/// Authenticate, then require the token's agent to match `claimed`
/// (§4.3 "Authorisation rule").
pub fn authenticate_as(
    state: &AppState,
    headers: &HeaderMap,
    claimed: &Address,
) -> Result<Address, ApiError> {
    let token_agent = authenticate(state, headers)?;
    sanctuary_auth::authorize(&token_agent, claimed)?;
    Ok(token_agent)
}
