//! Outbound HTTP seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use thiserror::Error;

use super::UpstreamKind;

/// Fully built outbound call, key already injected.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub upstream: UpstreamKind,
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Raw upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Upstream unreachable or the exchange failed mid-flight.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends outbound requests. No retries are performed at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Whole-exchange limit for one outbound call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Transport with [`DEFAULT_UPSTREAM_TIMEOUT`].
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_UPSTREAM_TIMEOUT)
    }

    /// A call still running after `timeout` fails with a [`TransportError`].
    /// The pinned unit serializes calls, so an unbounded call would stall
    /// every later one.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn describe(upstream: UpstreamKind, stage: &str, e: reqwest::Error) -> TransportError {
    // The URL may carry an API key in its query string.
    let e = e.without_url();
    if e.is_timeout() {
        TransportError(format!("{upstream} {stage} timed out: {e}"))
    } else {
        TransportError(format!("{upstream} {stage} failed: {e}"))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| describe(request.upstream, "request", e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| describe(request.upstream, "body read", e))?;

        Ok(TransportResponse { status, body })
    }
}
