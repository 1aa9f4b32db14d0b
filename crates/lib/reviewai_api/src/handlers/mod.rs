//! Request handlers.

pub mod auth;
pub mod config;
pub mod gemini;
pub mod health;
pub mod kakao;
pub mod server_time;
pub mod unit;
pub mod weather;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reviewai_core::upstream::UpstreamReply;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Fallback for unknown paths and methods.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Pass an upstream reply through with its status.
pub(crate) fn relay(reply: UpstreamReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
    (status, Json(reply.body)).into_response()
}

/// Treat empty query values as absent.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Decode a JSON request body whatever its `Content-Type` says.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::validation("Invalid request body", e.to_string()))
}

/// Decode query pairs into `T`. The first value of a repeated key wins.
pub(crate) fn parse_query<T: DeserializeOwned>(pairs: Vec<(String, String)>) -> AppResult<T> {
    let mut fields = Map::new();
    for (key, value) in pairs {
        fields.entry(key).or_insert(Value::String(value));
    }
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::validation("Invalid query parameters", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TokenRequest, WeatherQuery};

    #[test]
    fn first_query_value_wins() {
        let query: WeatherQuery = parse_query(vec![
            ("lat".into(), "1".into()),
            ("lat".into(), "2".into()),
            ("lon".into(), "3".into()),
            ("units".into(), "metric".into()),
        ])
        .unwrap();
        assert_eq!(query.lat.as_deref(), Some("1"));
        assert_eq!(query.lon.as_deref(), Some("3"));
    }

    #[test]
    fn empty_body_is_invalid_request_body() {
        let err = parse_body::<TokenRequest>(b"").unwrap_err();
        assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Invalid request body"));
    }

    #[test]
    fn body_with_unexpected_shape_is_invalid_request_body() {
        let err = parse_body::<TokenRequest>(br#"{"deviceId": 7}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref error, .. } if error == "Invalid request body"));
    }
}
