//! Units hosted by a separate unit-host process.
//!
//! The gateway authenticates to the host with a short-lived token minted
//! from the caller's identity and signed with the shared token secret. The
//! host answers with the final client-facing response, which is relayed
//! unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, error};

use super::{LocationHint, PinError, PinnedUnit, UnitId, UnitNamespace};
use crate::auth::token;
use crate::models::auth::{AuthContext, DeviceClaims};
use crate::upstream::{
    GeminiCall, OutboundRequest, ProxyError, Transport, UpstreamKind, UpstreamReply,
};

/// Lifetime of the token presented to the unit host.
pub const UNIT_TOKEN_TTL_SECS: i64 = 60;

/// Addresses units on a remote host by id.
pub struct RemoteNamespace {
    transport: Arc<dyn Transport>,
    base_url: String,
    secret: String,
}

impl RemoteNamespace {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl UnitNamespace for RemoteNamespace {
    async fn get(&self, id: &UnitId, hint: LocationHint) -> Result<Arc<dyn PinnedUnit>, PinError> {
        if self.base_url.is_empty() {
            return Err(PinError::Resolve("unit host URL is empty".into()));
        }
        let url = format!("{}/units/{id}/gemini", self.base_url.trim_end_matches('/'));
        debug!(unit_id = %id, %url, "resolved remote unit");
        Ok(Arc::new(RemoteUnit {
            transport: self.transport.clone(),
            url,
            hint,
            secret: self.secret.clone(),
        }))
    }
}

/// Client handle for a unit on the unit host.
pub struct RemoteUnit {
    transport: Arc<dyn Transport>,
    url: String,
    hint: LocationHint,
    secret: String,
}

#[async_trait]
impl PinnedUnit for RemoteUnit {
    async fn call(&self, ctx: &AuthContext, call: GeminiCall) -> Result<UpstreamReply, ProxyError> {
        let claims = DeviceClaims::access(&ctx.device_id, None, &ctx.device_hash);
        let bearer = token::generate(&claims, self.secret.as_bytes(), UNIT_TOKEN_TTL_SECS)
            .map_err(|e| ProxyError::UnitUnavailable(e.to_string()))?;

        let request = OutboundRequest {
            upstream: UpstreamKind::Gemini,
            method: Method::POST,
            url: self.url.clone(),
            query: vec![("locationHint".into(), self.hint.as_str().into())],
            headers: vec![("Authorization".into(), format!("Bearer {bearer}"))],
            body: Some(json!({
                "endpoint": call.operation.as_str(),
                "requestBody": call.request_body,
            })),
        };

        let response = self.transport.send(request).await.map_err(|e| {
            error!(url = %self.url, error = %e, "unit host unreachable");
            ProxyError::Transport(e.0)
        })?;

        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| ProxyError::InvalidBody(format!("unit host: {e}")))?;
        if (200..300).contains(&response.status) {
            Ok(UpstreamReply {
                status: response.status,
                body,
            })
        } else {
            Err(ProxyError::Relayed {
                status: response.status,
                body,
            })
        }
    }
}
