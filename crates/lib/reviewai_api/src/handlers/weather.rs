//! Current weather proxy.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Extension;
use reviewai_core::models::auth::AuthContext;
use reviewai_core::upstream::{ProxyRequest, WeatherParams};

use super::{parse_query, present, relay};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::WeatherQuery;

/// `GET /weather`
pub async fn weather_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<Response> {
    let Query(pairs) = query?;
    let params: WeatherQuery = parse_query(pairs)?;
    let (Some(lat), Some(lon)) = (present(params.lat), present(params.lon)) else {
        return Err(AppError::validation("Missing parameters", "lat and lon are required"));
    };

    let reply = state
        .dispatcher
        .forward(ProxyRequest::Weather(WeatherParams { lat, lon }), &ctx)
        .await?;
    Ok(relay(reply))
}
