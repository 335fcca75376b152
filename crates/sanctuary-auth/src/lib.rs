//! Challenge/response authentication and bearer-token issuance (§4.3).
//!
//! The service never accepts a raw secret: a caller proves control of
//! `agentSecret` by signing a server-issued nonce, and is handed a
//! short-lived, HMAC-sealed bearer token scoped to that agent.

mod challenge;
mod error;
mod token;

pub use challenge::{authorize, AuthService, IssuedToken, CHALLENGE_TAG};
pub use error::AuthError;
pub use token::TokenCodec;
