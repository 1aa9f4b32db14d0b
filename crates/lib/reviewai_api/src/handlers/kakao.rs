//! Keyword place search proxy.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Extension;
use reviewai_core::models::auth::AuthContext;
use reviewai_core::upstream::{LocalSearchParams, ProxyRequest};

use super::{parse_query, present, relay};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::LocalSearchQuery;

/// `GET /api/kakao-local`
pub async fn kakao_local_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<Response> {
    let Query(pairs) = query?;
    let params: LocalSearchQuery = parse_query(pairs)?;
    let (Some(query), Some(x), Some(y)) = (present(params.query), present(params.x), present(params.y))
    else {
        return Err(AppError::validation(
            "Missing required parameters",
            "query, x (longitude), and y (latitude) are required",
        ));
    };

    let request = ProxyRequest::KakaoLocal(LocalSearchParams {
        query,
        x,
        y,
        radius: present(params.radius),
        page: present(params.page),
        size: present(params.size),
        category_group_code: present(params.category_group_code),
    });
    let reply = state.dispatcher.forward(request, &ctx).await?;
    Ok(relay(reply))
}
