//! Device token request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;

use super::parse_body;
use crate::AppState;
use crate::error::AppResult;
use crate::models::{RefreshRequest, RefreshResponse, TokenRequest, TokenResponse};
use crate::services::auth;

/// `POST /api/auth/token`: register a device and issue its token pair.
pub async fn issue_token_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Json<TokenResponse>> {
    let body: TokenRequest = parse_body(&body?)?;
    Ok(Json(auth::issue_tokens(&state.config, body)?))
}

/// `POST /api/auth/refresh`: exchange a refresh token for an access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Json<RefreshResponse>> {
    let body: RefreshRequest = parse_body(&body?)?;
    Ok(Json(auth::refresh_tokens(&state.config, body)?))
}
