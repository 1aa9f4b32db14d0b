//! Request and response bodies. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AdMobConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Upstream status, only on search failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            status: None,
            details: None,
        }
    }

    pub fn message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn upstream_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    /// Free-form; objects are hashed as compact JSON.
    #[serde(default)]
    pub device_info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

// ---------------------------------------------------------------------------
// Proxies
// ---------------------------------------------------------------------------

/// Body of `POST /api/gemini-proxy`, and of the unit-host call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiProxyRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub request_body: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalSearchQuery {
    pub query: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub radius: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    pub category_group_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitQuery {
    pub location_hint: Option<String>,
}

// ---------------------------------------------------------------------------
// Public info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdUnits {
    pub rewarded: String,
    pub banner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdMobUnits {
    pub ios: AdUnits,
    pub android: AdUnits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub ad_mob: AdMobUnits,
}

impl From<&AdMobConfig> for ConfigResponse {
    fn from(admob: &AdMobConfig) -> Self {
        Self {
            ad_mob: AdMobUnits {
                ios: AdUnits {
                    rewarded: admob.ios_rewarded.clone(),
                    banner: admob.ios_banner.clone(),
                },
                android: AdUnits {
                    rewarded: admob.android_rewarded.clone(),
                    banner: admob.android_banner.clone(),
                },
            },
        }
    }
}
