//! Device token service: issuance, refresh and bearer verification on top of
//! `reviewai_core::auth`.

use reviewai_core::auth::device::derive_device_hash;
use reviewai_core::auth::token::{self, ACCESS_TOKEN_TTL_SECS};
use reviewai_core::auth::TokenError;
use reviewai_core::models::auth::AuthContext;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult, AuthFailure};
use crate::models::{RefreshRequest, RefreshResponse, TokenRequest, TokenResponse};

const TOKEN_TYPE: &str = "Bearer";

fn signing_secret(config: &ApiConfig) -> AppResult<&[u8]> {
    if config.jwt_secret.is_empty() {
        return Err(AppError::Configuration("JWT secret not configured".into()));
    }
    Ok(config.jwt_secret.as_bytes())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `deviceInfo` as it enters the device hash.
fn device_info_text(info: Option<&Value>) -> String {
    match info {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Register a device and mint its access/refresh pair.
pub fn issue_tokens(config: &ApiConfig, req: TokenRequest) -> AppResult<TokenResponse> {
    let (Some(device_id), Some(app_version)) = (non_empty(req.device_id), non_empty(req.app_version))
    else {
        return Err(AppError::validation(
            "Missing required fields",
            "deviceId and appVersion are required",
        ));
    };

    // Versions compare as plain strings.
    if app_version.as_str() < config.min_app_version.as_str() {
        debug!(%device_id, %app_version, min = %config.min_app_version, "app version rejected");
        return Err(AppError::validation(
            "App version too old",
            format!("Minimum app version required: {}", config.min_app_version),
        ));
    }

    let secret = signing_secret(config)?;
    let info = device_info_text(req.device_info.as_ref());
    let device_hash = derive_device_hash(&device_id, &app_version, &info);
    let pair = token::issue_device_tokens(&device_id, &app_version, &device_hash, secret)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(%device_id, %app_version, "issued device tokens");
    Ok(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: ACCESS_TOKEN_TTL_SECS,
        token_type: TOKEN_TYPE.into(),
    })
}

/// Exchange a refresh token for a new access token.
pub fn refresh_tokens(config: &ApiConfig, req: RefreshRequest) -> AppResult<RefreshResponse> {
    let Some(refresh_token) = non_empty(req.refresh_token) else {
        return Err(AppError::invalid("Refresh token is required"));
    };
    let secret = signing_secret(config)?;

    match token::refresh(&refresh_token, secret) {
        Ok(access_token) => Ok(RefreshResponse {
            access_token,
            expires_in: ACCESS_TOKEN_TTL_SECS,
            token_type: TOKEN_TYPE.into(),
        }),
        Err(TokenError::WrongType) => Err(AppError::invalid("Invalid token type")),
        Err(e) => {
            warn!(error = %e, "refresh token rejected");
            Err(AppError::RefreshRejected)
        }
    }
}

/// Verify the value of an `Authorization` header and derive the caller.
///
/// Only a header without the `Bearer ` scheme counts as missing. An empty
/// token after the scheme is verified like any other and fails as invalid.
pub fn authenticate(config: &ApiConfig, header: Option<&str>) -> AppResult<AuthContext> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized(AuthFailure::Missing))?;
    let secret = signing_secret(config)?;

    let claims = token::verify(token, secret).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        AppError::Unauthorized(AuthFailure::from(e))
    })?;

    AuthContext::from_claims(&claims).ok_or_else(|| {
        let failure = if claims.device.is_refresh() {
            AuthFailure::WrongType
        } else {
            AuthFailure::Malformed
        };
        AppError::Unauthorized(failure)
    })
}

#[cfg(test)]
mod tests {
    use reviewai_core::models::auth::DeviceClaims;
    use serde_json::json;

    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            jwt_secret: "test-secret".into(),
            min_app_version: "1.5.0".into(),
            ..Default::default()
        }
    }

    fn token_request(device_id: &str, app_version: &str) -> TokenRequest {
        TokenRequest {
            device_id: Some(device_id.into()),
            app_version: Some(app_version.into()),
            device_info: None,
        }
    }

    #[test]
    fn issued_access_token_authenticates() {
        let config = config();
        let resp = issue_tokens(&config, token_request("d1", "2.0.0")).unwrap();
        assert_eq!(resp.expires_in, 3600);
        assert_eq!(resp.token_type, "Bearer");

        let header = format!("Bearer {}", resp.access_token);
        let ctx = authenticate(&config, Some(&header)).unwrap();
        assert_eq!(ctx.device_id, "d1");
        assert_eq!(ctx.device_hash, derive_device_hash("d1", "2.0.0", ""));
    }

    #[test]
    fn missing_or_empty_fields_rejected() {
        for req in [
            TokenRequest::default(),
            token_request("", "2.0.0"),
            token_request("d1", ""),
        ] {
            let err = issue_tokens(&config(), req).unwrap_err();
            assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Missing required fields"));
        }
    }

    #[test]
    fn old_version_rejected() {
        let err = issue_tokens(&config(), token_request("d1", "1.0.0")).unwrap_err();
        match err {
            AppError::Validation { error, message } => {
                assert_eq!(error, "App version too old");
                assert_eq!(message.as_deref(), Some("Minimum app version required: 1.5.0"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn object_device_info_hashed_as_json() {
        assert_eq!(device_info_text(Some(&json!({"os": "ios"}))), r#"{"os":"ios"}"#);
        assert_eq!(device_info_text(Some(&json!("pixel"))), "pixel");
        assert_eq!(device_info_text(Some(&Value::Null)), "");
    }

    #[test]
    fn empty_secret_is_configuration_error() {
        let config = ApiConfig::default();
        let err = issue_tokens(&config, token_request("d1", "2.0.0")).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn refresh_requires_refresh_token() {
        let config = config();
        let pair = issue_tokens(&config, token_request("d1", "2.0.0")).unwrap();

        let err = refresh_tokens(
            &config,
            RefreshRequest {
                refresh_token: Some(pair.access_token),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Invalid token type"));

        let resp = refresh_tokens(
            &config,
            RefreshRequest {
                refresh_token: Some(pair.refresh_token),
            },
        )
        .unwrap();
        let ctx = authenticate(&config, Some(&format!("Bearer {}", resp.access_token))).unwrap();
        assert_eq!(ctx.device_id, "d1");
    }

    #[test]
    fn refresh_with_garbage_is_rejected() {
        let err = refresh_tokens(
            &config(),
            RefreshRequest {
                refresh_token: Some("not.a.token".into()),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::RefreshRejected));

        let err = refresh_tokens(&config(), RefreshRequest::default()).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Refresh token is required"));
    }

    #[test]
    fn authenticate_rejects_missing_and_refresh_tokens() {
        let config = config();
        for header in [None, Some("Basic abc"), Some("Bearer")] {
            assert!(matches!(
                authenticate(&config, header),
                Err(AppError::Unauthorized(AuthFailure::Missing))
            ));
        }

        let refresh = token::generate(
            &DeviceClaims::refresh("d1", "h"),
            config.jwt_secret.as_bytes(),
            60,
        )
        .unwrap();
        assert!(matches!(
            authenticate(&config, Some(&format!("Bearer {refresh}"))),
            Err(AppError::Unauthorized(AuthFailure::WrongType))
        ));
    }

    #[test]
    fn empty_bearer_token_is_invalid_not_missing() {
        assert!(matches!(
            authenticate(&config(), Some("Bearer ")),
            Err(AppError::Unauthorized(AuthFailure::Malformed))
        ));
    }

    #[test]
    fn authenticate_rejects_token_without_device_hash() {
        let config = config();
        let token = token::generate(
            &DeviceClaims::access("d1", None, ""),
            config.jwt_secret.as_bytes(),
            60,
        )
        .unwrap();
        assert!(matches!(
            authenticate(&config, Some(&format!("Bearer {token}"))),
            Err(AppError::Unauthorized(AuthFailure::Malformed))
        ));
    }
}
