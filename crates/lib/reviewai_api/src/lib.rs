//! # reviewai_api
//!
//! HTTP API library for the ReviewAI gateway.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::routing::{get, post};
use reviewai_core::pin::{LocalNamespace, RegionPin, RemoteNamespace, UnitNamespace};
use reviewai_core::ratelimit::{KvStore, RateLimiter};
use reviewai_core::upstream::{ProxyDispatcher, Transport};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::handlers::{auth, config as config_handlers, gemini, health, kakao, server_time, unit, weather};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub limiter: Arc<RateLimiter>,
    /// Search and weather calls.
    pub dispatcher: Arc<ProxyDispatcher>,
    /// Generative-AI calls.
    pub gemini: Arc<RegionPin>,
    /// Units this process hosts itself.
    pub units: Arc<LocalNamespace>,
}

impl AppState {
    /// Wire the services from configuration.
    ///
    /// The pinned unit runs in-process unless `config.pin.unit_url` names a
    /// unit host.
    pub fn new(config: ApiConfig, store: Arc<dyn KvStore>, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Arc::new(ProxyDispatcher::new(
            transport.clone(),
            config.upstream_keys.clone(),
            config.endpoints.clone(),
        ));
        let units = Arc::new(LocalNamespace::new(dispatcher.clone()));

        let namespace: Arc<dyn UnitNamespace> = match &config.pin.unit_url {
            Some(url) => {
                info!(unit_host = %url, "generative-AI calls go to a remote unit host");
                Arc::new(RemoteNamespace::new(transport, url.clone(), config.jwt_secret.clone()))
            }
            None => units.clone(),
        };
        let gemini = Arc::new(RegionPin::new(
            namespace,
            config.pin.unit_name.clone(),
            config.pin.location_hint,
        ));
        let limiter = Arc::new(RateLimiter::new(store, config.rate_limit));

        Self {
            config: Arc::new(config),
            limiter,
            dispatcher,
            gemini,
            units,
        }
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-app-token"),
        ])
        .max_age(Duration::from_secs(86_400))
}

/// Builds the gateway router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/token", post(auth::issue_token_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route("/api/config", get(config_handlers::config_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/api/gemini-proxy", post(gemini::gemini_proxy_handler))
        .route("/api/kakao-local", get(kakao::kakao_local_handler))
        .route("/weather", get(weather::weather_handler))
        .route("/api/server-time", get(server_time::server_time_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        // Answers every OPTIONS request itself, before the throttle.
        .layer(cors())
        .with_state(state)
}

/// Router for a process started as the unit host.
pub fn unit_router(state: AppState) -> Router {
    let units = Router::new()
        .route("/units/{unit_id}/gemini", post(unit::unit_call_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(units)
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
