//! Authentication middleware: Bearer token extraction and verification.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;
use crate::services::auth::authenticate;

/// Axum middleware: verifies `Authorization: Bearer <token>` and injects the
/// caller's `AuthContext` into request extensions.
///
/// Refresh tokens and tokens without a device identity are refused, so
/// handlers behind this layer always see a usable identity.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let ctx = authenticate(&state.config, header)?;
    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}
