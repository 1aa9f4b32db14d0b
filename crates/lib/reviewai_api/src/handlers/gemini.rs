//! Generative-AI proxy. Calls go through the region-pinned unit, never
//! straight to the upstream.

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::response::Response;
use reviewai_core::models::auth::AuthContext;
use reviewai_core::upstream::{GeminiCall, GeminiOperation};
use tracing::debug;

use super::{parse_body, relay};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::GeminiProxyRequest;

/// Validate a `{endpoint, requestBody}` body into a call.
///
/// The endpoint is checked first, so an unknown one is refused whatever the
/// rest of the body looks like.
pub(crate) fn parse_call(body: GeminiProxyRequest) -> AppResult<GeminiCall> {
    let operation: GeminiOperation = body
        .endpoint
        .as_deref()
        .unwrap_or_default()
        .parse()?;
    let request_body = body
        .request_body
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::validation("Missing required fields", "requestBody is required"))?;
    Ok(GeminiCall {
        operation,
        request_body,
    })
}

/// `POST /api/gemini-proxy`
pub async fn gemini_proxy_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Response> {
    let call = parse_call(parse_body(&body?)?)?;
    debug!(device_id = %ctx.device_id, operation = %call.operation, "gemini call");

    let reply = state.gemini.call(&ctx, call).await?;
    Ok(relay(reply))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unknown_endpoint_refused_before_body_check() {
        let err = parse_call(GeminiProxyRequest {
            endpoint: Some("deleteEverything".into()),
            request_body: None,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Invalid endpoint"));

        let err = parse_call(GeminiProxyRequest::default()).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Invalid endpoint"));
    }

    #[test]
    fn missing_request_body_refused() {
        let err = parse_call(GeminiProxyRequest {
            endpoint: Some("generateContent".into()),
            request_body: None,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Missing required fields"));
    }

    #[test]
    fn valid_call_parses() {
        let call = parse_call(GeminiProxyRequest {
            endpoint: Some("validateImage".into()),
            request_body: Some(json!({"contents": []})),
        })
        .unwrap();
        assert_eq!(call.operation, GeminiOperation::ValidateImage);
    }
}
