//! Per-client fixed-window throttle applied to every request.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::AppState;
use crate::error::AppError;

/// Identity used when neither the proxy header nor the peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client identity: address from the trusted proxy header when one is
/// configured, else peer IP, else `unknown`.
pub fn client_id(headers: &HeaderMap, ip_header: Option<&str>, peer: Option<SocketAddr>) -> String {
    ip_header
        .and_then(|name| headers.get(name))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Axum middleware: refuses the request with 429 once the client's window is
/// exhausted. A failing store lets the request through.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(request.headers(), state.config.client_ip_header.as_deref(), peer);

    match state.limiter.allow(&client).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(client_id = %client, "rate limited");
            return Err(AppError::RateLimited);
        }
        Err(e) => warn!(client_id = %client, error = %e, "rate limit store failed; allowing request"),
    }

    Ok(next.run(request).await)
}
