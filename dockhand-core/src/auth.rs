//! Registry auth codec
//!
//! The engine expects registry credentials on pull and push as URL-safe
//! base64 of a JSON object `{"username","password","serveraddress"}`.
//! Encoding is deterministic: field order is fixed by the struct definition.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

use crate::domain::credential::RegistryCredential;
use crate::error::{CoreError, Result};

/// Encodes a credential into the engine's registry auth token
pub fn encode(credential: &RegistryCredential) -> Result<String> {
    let json = serde_json::to_vec(credential)
        .map_err(|e| CoreError::Auth(format!("failed to serialize credential: {}", e)))?;
    Ok(URL_SAFE.encode(json))
}

/// Decodes a registry auth token back into a credential
pub fn decode(token: &str) -> Result<RegistryCredential> {
    let json = URL_SAFE
        .decode(token)
        .map_err(|e| CoreError::Auth(format!("token is not url-safe base64: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| CoreError::Auth(format!("token does not hold a credential: {}", e)))
}
