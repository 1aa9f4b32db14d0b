//! Application error types.

use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reviewai_core::auth::TokenError;
use reviewai_core::upstream::{ProxyError, UpstreamKind};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Why a bearer token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Malformed,
    Expired,
    InvalidSignature,
    WrongType,
}

impl From<TokenError> for AuthFailure {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthFailure::Expired,
            TokenError::InvalidSignature => AuthFailure::InvalidSignature,
            TokenError::WrongType => AuthFailure::WrongType,
            TokenError::InvalidFormat | TokenError::Malformed(_) | TokenError::Encode(_) => {
                AuthFailure::Malformed
            }
        }
    }
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {error}")]
    Validation {
        error: String,
        message: Option<String>,
    },

    #[error("Unauthorized: {0:?}")]
    Unauthorized(AuthFailure),

    #[error("Refresh token rejected")]
    RefreshRejected,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Not found")]
    NotFound,

    /// Non-success upstream response, relayed with the upstream's status.
    #[error("{upstream} responded with {status}")]
    Upstream {
        upstream: UpstreamKind,
        status: u16,
        details: String,
    },

    /// Complete response produced by a remote unit host.
    #[error("Relayed response ({status})")]
    Relayed { status: u16, body: Value },

    #[error("Upstream request failed: {0}")]
    UpstreamUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn validation(error: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            error: error.into(),
            message: Some(message.into()),
        }
    }

    /// Validation error with no `message` field.
    pub fn invalid(error: impl Into<String>) -> Self {
        AppError::Validation {
            error: error.into(),
            message: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::RefreshRejected => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Upstream { status, .. } | AppError::Relayed { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::UpstreamUnavailable(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }

        let body = match self {
            AppError::Relayed { body, .. } => return (status, Json(body)).into_response(),
            AppError::Validation { error, message } => ErrorResponse::new(error).message(message),
            AppError::Unauthorized(AuthFailure::Missing) => {
                ErrorResponse::new("No valid token provided")
                    .message(Some("Authorization header with Bearer token is required".into()))
            }
            AppError::Unauthorized(AuthFailure::Expired) => ErrorResponse::new("Token expired")
                .message(Some("Please refresh your token".into())),
            AppError::Unauthorized(_) => {
                ErrorResponse::new("Invalid token").message(Some("Authentication failed".into()))
            }
            AppError::RefreshRejected => ErrorResponse::new("Invalid refresh token")
                .message(Some("Please re-authenticate".into())),
            AppError::RateLimited => ErrorResponse::new("Too many requests")
                .message(Some("Rate limit exceeded. Please try again later.".into())),
            AppError::NotFound => ErrorResponse::new("Not Found"),
            AppError::Upstream {
                upstream,
                status,
                details,
            } => {
                let body = ErrorResponse::new(upstream.error_label()).details(details);
                // The search client reads the upstream status from the body.
                if upstream == UpstreamKind::KakaoLocal {
                    body.upstream_status(status)
                } else {
                    body
                }
            }
            AppError::UpstreamUnavailable(_) => ErrorResponse::new("Upstream request failed"),
            AppError::Configuration(message) => ErrorResponse::new(message),
            AppError::Internal(_) => ErrorResponse::new("Internal server error"),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ProxyError> for AppError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::InvalidOperation(_) => AppError::invalid("Invalid endpoint"),
            ProxyError::MissingKey(_) => AppError::Configuration("API key not configured".into()),
            ProxyError::Status {
                upstream,
                status,
                body,
            } => AppError::Upstream {
                upstream,
                status,
                details: body,
            },
            ProxyError::Relayed { status, body } => AppError::Relayed { status, body },
            ProxyError::Transport(msg) => AppError::UpstreamUnavailable(msg),
            ProxyError::InvalidBody(msg) => AppError::UpstreamUnavailable(msg),
            ProxyError::UnitUnavailable(msg) => AppError::UpstreamUnavailable(msg),
        }
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        AppError::validation("Invalid request body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("Invalid query parameters", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation("Invalid path", rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn expired_token_asks_for_refresh() {
        let (status, body) = body_of(AppError::Unauthorized(AuthFailure::Expired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token expired");
        assert_eq!(body["message"], "Please refresh your token");
    }

    #[tokio::test]
    async fn other_auth_failures_are_generic() {
        for failure in [
            AuthFailure::Malformed,
            AuthFailure::InvalidSignature,
            AuthFailure::WrongType,
        ] {
            let (status, body) = body_of(AppError::Unauthorized(failure)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "Invalid token");
        }
    }

    #[tokio::test]
    async fn invalid_operation_is_bad_request_without_message() {
        let (status, body) =
            body_of(ProxyError::InvalidOperation("x".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "Invalid endpoint"}));
    }

    #[tokio::test]
    async fn upstream_status_is_relayed() {
        let err: AppError = ProxyError::Status {
            upstream: UpstreamKind::KakaoLocal,
            status: 403,
            body: "denied".into(),
        }
        .into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Kakao API error");
        assert_eq!(body["status"], 403);
        assert_eq!(body["details"], "denied");
    }

    #[tokio::test]
    async fn weather_error_has_no_status_field() {
        let err: AppError = ProxyError::Status {
            upstream: UpstreamKind::Weather,
            status: 401,
            body: "bad key".into(),
        }
        .into();
        let (_, body) = body_of(err).await;
        assert!(body.get("status").is_none());
    }

    #[tokio::test]
    async fn missing_key_is_configuration_error() {
        let (status, body) =
            body_of(ProxyError::MissingKey(UpstreamKind::Weather).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "API key not configured");
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let (status, body) = body_of(AppError::Internal("db password wrong".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));
    }

    #[test]
    fn token_errors_map_to_auth_failures() {
        assert_eq!(AuthFailure::from(TokenError::Expired), AuthFailure::Expired);
        assert_eq!(AuthFailure::from(TokenError::InvalidFormat), AuthFailure::Malformed);
        assert_eq!(
            AuthFailure::from(TokenError::InvalidSignature),
            AuthFailure::InvalidSignature
        );
    }
}
