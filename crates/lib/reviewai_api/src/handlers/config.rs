//! Client configuration endpoint.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::models::ConfigResponse;

/// `GET /api/config`: ad-unit identifiers; unset values are blank.
pub async fn config_handler(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse::from(&state.config.admob))
}
