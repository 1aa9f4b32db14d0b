//! Unit-host side of the region pin.
//!
//! A gateway configured with a unit URL posts each generative-AI call here.
//! The host runs the addressed unit in-process and answers with the final
//! client-facing response.

use axum::Extension;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use reviewai_core::models::auth::AuthContext;
use reviewai_core::pin::{LocationHint, UnitId, UnitNamespace};
use tracing::{debug, warn};

use super::gemini::parse_call;
use super::{parse_body, parse_query, relay};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{GeminiProxyRequest, UnitQuery};

/// `POST /units/{unit_id}/gemini?locationHint=…`
pub async fn unit_call_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    unit_id: Result<Path<String>, PathRejection>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Response> {
    let Path(unit_id) = unit_id?;
    let Query(pairs) = query?;
    let query: UnitQuery = parse_query(pairs)?;
    let id = UnitId::parse(&unit_id).map_err(|e| {
        warn!(error = %e, "rejected unit call");
        AppError::invalid("Invalid unit id")
    })?;
    let hint = match query.location_hint.as_deref() {
        Some(raw) => raw
            .parse::<LocationHint>()
            .map_err(|e| AppError::validation("Invalid location hint", e.to_string()))?,
        None => state.config.pin.location_hint,
    };
    let body: GeminiProxyRequest = parse_body(&body?)?;
    let call = parse_call(body)?;

    debug!(unit_id = %id, location_hint = %hint, device_id = %ctx.device_id, "unit call");
    let unit = state
        .units
        .get(&id, hint)
        .await
        .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
    let reply = unit.call(&ctx, call).await?;
    Ok(relay(reply))
}
