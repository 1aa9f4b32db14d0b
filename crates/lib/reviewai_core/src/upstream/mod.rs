//! Upstream third-party APIs and the dispatcher that calls them.
//!
//! Keys for every upstream live only in server configuration and are
//! injected here; clients never see them.

pub mod dispatcher;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

pub use dispatcher::ProxyDispatcher;
pub use transport::{
    DEFAULT_UPSTREAM_TIMEOUT, OutboundRequest, ReqwestTransport, Transport, TransportError,
    TransportResponse,
};

/// Third-party API a request is forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamKind {
    Gemini,
    KakaoLocal,
    Weather,
}

impl UpstreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamKind::Gemini => "gemini",
            UpstreamKind::KakaoLocal => "kakao-local",
            UpstreamKind::Weather => "weather",
        }
    }

    /// `error` field used when relaying a non-success upstream response.
    pub fn error_label(self) -> &'static str {
        match self {
            UpstreamKind::Gemini => "Gemini API error",
            UpstreamKind::KakaoLocal => "Kakao API error",
            UpstreamKind::Weather => "Weather API error",
        }
    }
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generative-AI operations clients may invoke.
///
/// The operation name becomes part of the upstream URL, so anything outside
/// this set is refused before a request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeminiOperation {
    GenerateContent,
    GenerateReviews,
    ValidateImage,
    BuildPersonalizedRecommendationPrompt,
    BuildGenericRecommendationPrompt,
}

impl GeminiOperation {
    pub const ALL: [GeminiOperation; 5] = [
        GeminiOperation::GenerateContent,
        GeminiOperation::GenerateReviews,
        GeminiOperation::ValidateImage,
        GeminiOperation::BuildPersonalizedRecommendationPrompt,
        GeminiOperation::BuildGenericRecommendationPrompt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GeminiOperation::GenerateContent => "generateContent",
            GeminiOperation::GenerateReviews => "generateReviews",
            GeminiOperation::ValidateImage => "validateImage",
            GeminiOperation::BuildPersonalizedRecommendationPrompt => {
                "buildPersonalizedRecommendationPrompt"
            }
            GeminiOperation::BuildGenericRecommendationPrompt => "buildGenericRecommendationPrompt",
        }
    }
}

impl FromStr for GeminiOperation {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GeminiOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ProxyError::InvalidOperation(s.to_string()))
    }
}

impl fmt::Display for GeminiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated generative-AI call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiCall {
    pub operation: GeminiOperation,
    pub request_body: Value,
}

/// Keyword search parameters, client names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSearchParams {
    pub query: String,
    /// Longitude.
    pub x: String,
    /// Latitude.
    pub y: String,
    pub radius: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    pub category_group_code: Option<String>,
}

/// Current-weather parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherParams {
    pub lat: String,
    pub lon: String,
}

/// An authorized request to forward upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyRequest {
    Gemini(GeminiCall),
    KakaoLocal(LocalSearchParams),
    Weather(WeatherParams),
}

impl ProxyRequest {
    pub fn target(&self) -> UpstreamKind {
        match self {
            ProxyRequest::Gemini(_) => UpstreamKind::Gemini,
            ProxyRequest::KakaoLocal(_) => UpstreamKind::KakaoLocal,
            ProxyRequest::Weather(_) => UpstreamKind::Weather,
        }
    }
}

/// Successful upstream result relayed to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Value,
}

/// Server-held API keys.
#[derive(Clone, Default)]
pub struct UpstreamKeys {
    pub gemini: Option<String>,
    pub kakao: Option<String>,
    pub weather: Option<String>,
}

impl UpstreamKeys {
    /// Configured key for `kind`; blank keys count as missing.
    pub fn for_kind(&self, kind: UpstreamKind) -> Option<&str> {
        let key = match kind {
            UpstreamKind::Gemini => self.gemini.as_deref(),
            UpstreamKind::KakaoLocal => self.kakao.as_deref(),
            UpstreamKind::Weather => self.weather.as_deref(),
        };
        key.filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for UpstreamKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamKeys")
            .field("gemini", &self.gemini.as_ref().map(|_| "<redacted>"))
            .field("kakao", &self.kakao.as_ref().map(|_| "<redacted>"))
            .field("weather", &self.weather.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Upstream locations. Overridable for staging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoints {
    pub gemini_base: String,
    pub gemini_model: String,
    pub kakao_local_url: String,
    pub weather_url: String,
}

impl Default for UpstreamEndpoints {
    fn default() -> Self {
        Self {
            gemini_base: "https://generativelanguage.googleapis.com".into(),
            gemini_model: "gemini-2.5-flash-lite".into(),
            kakao_local_url: "https://dapi.kakao.com/v2/local/search/keyword.json".into(),
            weather_url: "https://api.openweathermap.org/data/2.5/weather".into(),
        }
    }
}

/// Upstream dispatch failures.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid endpoint: {0}")]
    InvalidOperation(String),

    #[error("API key not configured for {0}")]
    MissingKey(UpstreamKind),

    #[error("{upstream} returned {status}")]
    Status {
        upstream: UpstreamKind,
        status: u16,
        body: String,
    },

    /// Error response from a remote pinned unit, passed through unchanged.
    #[error("Relayed error response ({status})")]
    Relayed { status: u16, body: Value },

    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("Invalid upstream response: {0}")]
    InvalidBody(String),

    #[error("Pinned unit unavailable: {0}")]
    UnitUnavailable(String),
}
