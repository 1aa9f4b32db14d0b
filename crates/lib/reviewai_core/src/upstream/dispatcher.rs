//! Builds outbound calls, injects server keys and relays results.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{error, info};

use super::transport::{OutboundRequest, Transport};
use super::{
    GeminiCall, LocalSearchParams, ProxyError, ProxyRequest, UpstreamEndpoints, UpstreamKeys,
    UpstreamKind, UpstreamReply, WeatherParams,
};
use crate::models::auth::AuthContext;

const DEFAULT_RADIUS: &str = "1000";
const DEFAULT_PAGE: &str = "1";
const DEFAULT_SIZE: &str = "15";

/// Forwards authorized requests to third-party APIs.
pub struct ProxyDispatcher {
    transport: Arc<dyn Transport>,
    keys: UpstreamKeys,
    endpoints: UpstreamEndpoints,
}

impl ProxyDispatcher {
    pub fn new(transport: Arc<dyn Transport>, keys: UpstreamKeys, endpoints: UpstreamEndpoints) -> Self {
        Self {
            transport,
            keys,
            endpoints,
        }
    }

    /// Send `request` upstream on behalf of `ctx`.
    ///
    /// Fails before any network call when the server key is missing.
    pub async fn forward(
        &self,
        request: ProxyRequest,
        ctx: &AuthContext,
    ) -> Result<UpstreamReply, ProxyError> {
        let kind = request.target();
        let key = self
            .keys
            .for_kind(kind)
            .ok_or(ProxyError::MissingKey(kind))?;

        let outbound = match &request {
            ProxyRequest::Gemini(call) => self.gemini_request(call, key),
            ProxyRequest::KakaoLocal(params) => self.kakao_request(params, key),
            ProxyRequest::Weather(params) => self.weather_request(params, key),
        };

        info!(
            upstream = %kind,
            device_id = %ctx.device_id,
            url = %outbound.url,
            "forwarding upstream request"
        );

        let response = self.transport.send(outbound).await.map_err(|e| {
            error!(upstream = %kind, error = %e, "upstream unreachable");
            ProxyError::Transport(e.0)
        })?;

        if !(200..300).contains(&response.status) {
            error!(upstream = %kind, status = response.status, body = %response.body, "upstream error");
            return Err(ProxyError::Status {
                upstream: kind,
                status: response.status,
                body: response.body,
            });
        }

        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| ProxyError::InvalidBody(format!("{kind}: {e}")))?;
        Ok(UpstreamReply {
            status: response.status,
            body,
        })
    }

    /// `POST {base}/v1beta/models/{model}:{operation}?key=…`
    fn gemini_request(&self, call: &GeminiCall, key: &str) -> OutboundRequest {
        let url = format!(
            "{}/v1beta/models/{}:{}",
            self.endpoints.gemini_base.trim_end_matches('/'),
            self.endpoints.gemini_model,
            call.operation.as_str()
        );
        OutboundRequest {
            upstream: UpstreamKind::Gemini,
            method: Method::POST,
            url,
            query: vec![("key".into(), key.into())],
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(call.request_body.clone()),
        }
    }

    fn kakao_request(&self, params: &LocalSearchParams, key: &str) -> OutboundRequest {
        let mut query = vec![
            ("query".to_string(), params.query.clone()),
            ("x".to_string(), params.x.clone()),
            ("y".to_string(), params.y.clone()),
            (
                "radius".to_string(),
                params.radius.clone().unwrap_or_else(|| DEFAULT_RADIUS.into()),
            ),
            (
                "page".to_string(),
                params.page.clone().unwrap_or_else(|| DEFAULT_PAGE.into()),
            ),
            (
                "size".to_string(),
                params.size.clone().unwrap_or_else(|| DEFAULT_SIZE.into()),
            ),
            ("sort".to_string(), "distance".to_string()),
        ];
        if let Some(code) = &params.category_group_code {
            query.push(("category_group_code".into(), code.clone()));
        }
        OutboundRequest {
            upstream: UpstreamKind::KakaoLocal,
            method: Method::GET,
            url: self.endpoints.kakao_local_url.clone(),
            query,
            headers: vec![
                ("Authorization".into(), format!("KakaoAK {key}")),
                ("Content-Type".into(), "application/json".into()),
            ],
            body: None,
        }
    }

    fn weather_request(&self, params: &WeatherParams, key: &str) -> OutboundRequest {
        OutboundRequest {
            upstream: UpstreamKind::Weather,
            method: Method::GET,
            url: self.endpoints.weather_url.clone(),
            query: vec![
                ("lat".into(), params.lat.clone()),
                ("lon".into(), params.lon.clone()),
                ("appid".into(), key.into()),
                ("units".into(), "metric".into()),
                ("lang".into(), "kr".into()),
            ],
            headers: Vec::new(),
            body: None,
        }
    }
}
