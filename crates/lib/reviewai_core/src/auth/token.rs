//! Signed device tokens (HS256, three base64url segments).
//!
//! Tokens are never persisted server-side. There is no revocation: an issued
//! token stays valid until `exp`, and `jti` is not checked against any
//! seen-set, so replay within the lifetime is not prevented.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, crypto, encode};
use tracing::debug;

use super::TokenError;
use crate::models::auth::{DeviceClaims, TokenClaims};

/// Fixed `iss` claim.
pub const ISSUER: &str = "reviewai-api";

/// Fixed `aud` claim.
pub const AUDIENCE: &str = "reviewai-app";

/// Access token lifetime: 1 hour.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;

/// Access + refresh token pair issued on device registration.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Sign `claims` with `iat = now` and `exp = now + ttl_secs`.
pub fn generate(claims: &DeviceClaims, secret: &[u8], ttl_secs: i64) -> Result<String, TokenError> {
    generate_at(claims, secret, ttl_secs, Utc::now().timestamp())
}

/// Same as [`generate`] with an explicit clock value; deterministic for
/// identical inputs.
pub fn generate_at(
    claims: &DeviceClaims,
    secret: &[u8],
    ttl_secs: i64,
    now: i64,
) -> Result<String, TokenError> {
    if ttl_secs <= 0 {
        return Err(TokenError::Encode(format!("ttl must be positive, got {ttl_secs}")));
    }
    let payload = TokenClaims {
        device: claims.clone(),
        iat: now,
        exp: now + ttl_secs,
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))
}

/// Verify a token against the current time.
pub fn verify(token: &str, secret: &[u8]) -> Result<TokenClaims, TokenError> {
    verify_at(token, secret, Utc::now().timestamp())
}

/// Verify a token: segment count, then signature, then expiry.
pub fn verify_at(token: &str, secret: &[u8], now: i64) -> Result<TokenClaims, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::InvalidFormat);
    };

    // Signed message is "header.payload", a prefix of the token itself.
    let message = &token[..header.len() + 1 + payload.len()];

    // jsonwebtoken re-signs and compares in constant time.
    let valid = crypto::verify(
        signature,
        message.as_bytes(),
        &DecodingKey::from_secret(secret),
        Algorithm::HS256,
    )
    .unwrap_or(false);
    if !valid {
        return Err(TokenError::InvalidSignature);
    }

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Malformed(format!("payload encoding: {e}")))?;
    let claims: TokenClaims = serde_json::from_slice(&raw)
        .map_err(|e| TokenError::Malformed(format!("payload json: {e}")))?;

    if claims.exp < now {
        debug!(jti = %claims.device.jti, exp = claims.exp, "token expired");
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

/// Exchange a refresh token for a new access token.
pub fn refresh(refresh_token: &str, secret: &[u8]) -> Result<String, TokenError> {
    refresh_at(refresh_token, secret, Utc::now().timestamp())
}

/// Same as [`refresh`] with an explicit clock value.
///
/// The new access token keeps `deviceId`/`deviceHash` and gets a fresh
/// `jti`. No new refresh token is issued.
pub fn refresh_at(refresh_token: &str, secret: &[u8], now: i64) -> Result<String, TokenError> {
    let claims = verify_at(refresh_token, secret, now)?;
    if !claims.device.is_refresh() {
        return Err(TokenError::WrongType);
    }
    let access = DeviceClaims::access(&claims.device.device_id, None, &claims.device.device_hash);
    generate_at(&access, secret, ACCESS_TOKEN_TTL_SECS, now)
}

/// Mint the access/refresh pair for a newly registered device.
pub fn issue_device_tokens(
    device_id: &str,
    app_version: &str,
    device_hash: &str,
    secret: &[u8],
) -> Result<TokenPair, TokenError> {
    let now = Utc::now().timestamp();
    let access = DeviceClaims::access(device_id, Some(app_version), device_hash);
    let refresh = DeviceClaims::refresh(device_id, device_hash);
    Ok(TokenPair {
        access_token: generate_at(&access, secret, ACCESS_TOKEN_TTL_SECS, now)?,
        refresh_token: generate_at(&refresh, secret, REFRESH_TOKEN_TTL_SECS, now)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";
    const NOW: i64 = 1_700_000_000;

    fn claims() -> DeviceClaims {
        DeviceClaims::access("d1", Some("2.0.0"), "hash-1")
    }

    /// Replace the character at `idx` with a different base64url character.
    fn flip_char(s: &str, idx: usize) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[idx] = if chars[idx] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[test]
    fn verify_returns_generated_claims() {
        let c = claims();
        let token = generate_at(&c, SECRET, 3600, NOW).unwrap();
        let verified = verify_at(&token, SECRET, NOW).unwrap();
        assert_eq!(verified.device, c);
        assert_eq!(verified.iat, NOW);
        assert_eq!(verified.exp, verified.iat + 3600);
        assert_eq!(verified.iss, ISSUER);
        assert_eq!(verified.aud, AUDIENCE);
    }

    #[test]
    fn token_has_three_segments() {
        let token = generate_at(&claims(), SECRET, 60, NOW).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn generate_is_deterministic_for_same_clock() {
        let c = claims();
        let a = generate_at(&c, SECRET, 60, NOW).unwrap();
        let b = generate_at(&c, SECRET, 60, NOW).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        assert!(matches!(
            generate_at(&claims(), SECRET, 0, NOW),
            Err(TokenError::Encode(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_at(&claims(), SECRET, 60, NOW).unwrap();
        assert_eq!(verify_at(&token, SECRET, NOW + 61), Err(TokenError::Expired));
    }

    #[test]
    fn token_is_valid_at_exact_expiry() {
        let token = generate_at(&claims(), SECRET, 60, NOW).unwrap();
        assert!(verify_at(&token, SECRET, NOW + 60).is_ok());
    }

    #[test]
    fn wrong_segment_count_is_invalid_format() {
        assert_eq!(verify_at("a.b", SECRET, NOW), Err(TokenError::InvalidFormat));
        assert_eq!(verify_at("a.b.c.d", SECRET, NOW), Err(TokenError::InvalidFormat));
        assert_eq!(verify_at("", SECRET, NOW), Err(TokenError::InvalidFormat));
    }

    #[test]
    fn altering_any_signature_char_is_invalid_signature() {
        let token = generate_at(&claims(), SECRET, 60, NOW).unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;
        for idx in sig_start..token.len() {
            let tampered = flip_char(&token, idx);
            assert_eq!(
                verify_at(&tampered, SECRET, NOW),
                Err(TokenError::InvalidSignature),
                "tampered index {idx}"
            );
        }
    }

    #[test]
    fn altered_payload_is_invalid_signature() {
        let token = generate_at(&claims(), SECRET, 60, NOW).unwrap();
        let payload_idx = token.find('.').unwrap() + 3;
        let tampered = flip_char(&token, payload_idx);
        assert_eq!(verify_at(&tampered, SECRET, NOW), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = generate_at(&claims(), SECRET, 60, NOW).unwrap();
        assert_eq!(
            verify_at(&token, b"other-secret", NOW),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn signed_garbage_payload_is_malformed() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"hello":"world"}"#);
        let message = format!("{header}.{payload}");
        let signature = crypto::sign(
            message.as_bytes(),
            &EncodingKey::from_secret(SECRET),
            Algorithm::HS256,
        )
        .unwrap();
        let token = format!("{message}.{signature}");
        assert!(matches!(
            verify_at(&token, SECRET, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    /// Sign an arbitrary JSON payload the way older deployments did.
    fn sign_raw(payload: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            payload,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn refresh_token_without_jti_is_accepted() {
        let rt = sign_raw(&serde_json::json!({
            "deviceId": "d1",
            "deviceHash": "hash-1",
            "type": "refresh",
            "iat": NOW,
            "exp": NOW + 600,
        }));
        let verified = verify_at(&rt, SECRET, NOW).unwrap();
        assert!(verified.device.jti.is_empty());

        let access = refresh_at(&rt, SECRET, NOW).unwrap();
        let verified = verify_at(&access, SECRET, NOW).unwrap();
        assert_eq!(verified.device.device_id, "d1");
        assert!(!verified.device.jti.is_empty());
        assert_eq!(verified.iss, ISSUER);
    }

    #[test]
    fn refresh_rejects_access_token() {
        let token = generate_at(&claims(), SECRET, 60, NOW).unwrap();
        assert_eq!(refresh_at(&token, SECRET, NOW), Err(TokenError::WrongType));
    }

    #[test]
    fn refresh_rejects_expired_refresh_token() {
        let rt = generate_at(&DeviceClaims::refresh("d1", "h"), SECRET, 60, NOW).unwrap();
        assert_eq!(refresh_at(&rt, SECRET, NOW + 120), Err(TokenError::Expired));
    }

    #[test]
    fn refresh_mints_access_token_for_same_device() {
        let rc = DeviceClaims::refresh("d1", "hash-1");
        let rt = generate_at(&rc, SECRET, REFRESH_TOKEN_TTL_SECS, NOW).unwrap();
        let access = refresh_at(&rt, SECRET, NOW + 10).unwrap();
        let verified = verify_at(&access, SECRET, NOW + 10).unwrap();
        assert_eq!(verified.device.device_id, "d1");
        assert_eq!(verified.device.device_hash, "hash-1");
        assert_ne!(verified.device.jti, rc.jti);
        assert!(verified.device.token_use.is_none());
        assert_eq!(verified.exp, NOW + 10 + ACCESS_TOKEN_TTL_SECS);
    }

    #[test]
    fn issued_pair_has_distinct_types() {
        let pair = issue_device_tokens("d1", "2.0.0", "h", SECRET).unwrap();
        let access = verify(&pair.access_token, SECRET).unwrap();
        let refresh = verify(&pair.refresh_token, SECRET).unwrap();
        assert!(!access.device.is_refresh());
        assert!(refresh.device.is_refresh());
        assert_eq!(access.device.app_version.as_deref(), Some("2.0.0"));
        assert_eq!(refresh.exp - refresh.iat, REFRESH_TOKEN_TTL_SECS);
    }
}
