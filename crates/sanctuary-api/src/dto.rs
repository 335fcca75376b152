//! Hex-string parsing shared by every handler's request bodies.

use sanctuary_crypto::{Address, PublicKey, Signature65};
use sanctuary_types::ServiceError;

use crate::error::ApiError;

pub fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Address::from_hex(raw).map_err(|_| ApiError(ServiceError::InvalidInput("malformed address".into())))
}

pub fn parse_signature(raw: &str) -> Result<Signature65, ApiError> {
    let bytes = hex::decode(raw)
        .map_err(|_| ApiError(ServiceError::InvalidInput("signature is not valid hex".into())))?;
    let array: [u8; 65] = bytes
        .try_into()
        .map_err(|_| ApiError(ServiceError::InvalidInput("signature must be 65 bytes".into())))?;
    Ok(Signature65::from_bytes(array))
}

pub fn parse_public_key(raw: &str) -> Result<PublicKey, ApiError> {
    let bytes = hex::decode(raw)
        .map_err(|_| ApiError(ServiceError::InvalidInput("public key is not valid hex".into())))?;
    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|_| ApiError(ServiceError::InvalidInput("malformed public key".into())))
}
