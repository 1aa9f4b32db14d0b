//! Authentication domain models.
//!
//! Field names on the wire are camelCase to stay compatible with the mobile
//! client that decodes the token payload.

use serde::{Deserialize, Serialize};

/// Marker carried in the `type` claim. Access tokens omit the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Refresh,
}

/// Custom claims supplied by the caller of `token::generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClaims {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    pub device_hash: String,
    /// Unique per issuance. Not checked against any seen-set. Tokens minted
    /// before `jti` was added carry an empty one.
    #[serde(default)]
    pub jti: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<TokenUse>,
}

impl DeviceClaims {
    /// Claims for an access token with a fresh `jti`.
    pub fn access(device_id: &str, app_version: Option<&str>, device_hash: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            app_version: app_version.map(str::to_string),
            device_hash: device_hash.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_use: None,
        }
    }

    /// Claims for a refresh token with a fresh `jti`.
    pub fn refresh(device_id: &str, device_hash: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            app_version: None,
            device_hash: device_hash.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_use: Some(TokenUse::Refresh),
        }
    }

    pub fn is_refresh(&self) -> bool {
        self.token_use == Some(TokenUse::Refresh)
    }
}

/// Full payload of a signed token: custom claims plus the registered ones.
///
/// Only `exp` is required among the registered claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(flatten)]
    pub device: DeviceClaims,
    /// Issued at (unix timestamp, seconds).
    #[serde(default)]
    pub iat: i64,
    /// Expiry (unix timestamp, seconds).
    pub exp: i64,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub aud: String,
}

/// Identity derived from a verified access token, scoped to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub device_id: String,
    pub device_hash: String,
}

impl AuthContext {
    /// Derive the request identity from verified claims.
    ///
    /// Returns `None` for refresh tokens and for payloads missing the device
    /// identity, neither of which may authorize a protected call.
    pub fn from_claims(claims: &TokenClaims) -> Option<Self> {
        let device = &claims.device;
        if device.is_refresh() || device.device_id.is_empty() || device.device_hash.is_empty() {
            return None;
        }
        Some(Self {
            device_id: device.device_id.clone(),
            device_hash: device.device_hash.clone(),
        })
    }
}
