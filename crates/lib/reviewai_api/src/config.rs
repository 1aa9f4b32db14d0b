//! Gateway configuration.

use std::fmt;
use std::time::Duration;

use reviewai_core::pin::{DEFAULT_UNIT_NAME, LocationHint};
use reviewai_core::ratelimit::RateLimitPolicy;
use reviewai_core::upstream::{DEFAULT_UPSTREAM_TIMEOUT, UpstreamEndpoints, UpstreamKeys};
use tracing::warn;

/// Longest accepted rate-limit window: one year.
pub const MAX_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(365 * 24 * 3600);

/// Ad-unit identifiers handed to the client. Blank when unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdMobConfig {
    pub ios_rewarded: String,
    pub ios_banner: String,
    pub android_rewarded: String,
    pub android_banner: String,
}

/// Where generative-AI calls are executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinConfig {
    /// Fixed unit name every instance resolves.
    pub unit_name: String,
    pub location_hint: LocationHint,
    /// Unit host base URL; `None` runs the unit in-process.
    pub unit_url: Option<String>,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            unit_name: DEFAULT_UNIT_NAME.to_string(),
            location_hint: LocationHint::Wnam,
            unit_url: None,
        }
    }
}

/// Configuration for the gateway.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8787").
    pub bind_addr: String,
    /// Token signing secret. Empty means token routes are unavailable.
    pub jwt_secret: String,
    /// Lowest accepted app version (plain string comparison).
    pub min_app_version: String,
    /// Header carrying the caller's address, set by a trusted fronting proxy.
    /// `None` keys the throttle on the peer address only.
    pub client_ip_header: Option<String>,
    pub rate_limit: RateLimitPolicy,
    /// Limit for each outbound upstream call.
    pub upstream_timeout: Duration,
    pub upstream_keys: UpstreamKeys,
    pub endpoints: UpstreamEndpoints,
    pub admob: AdMobConfig,
    pub pin: PinConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8787".into(),
            jwt_secret: String::new(),
            min_app_version: "1.0.0".into(),
            client_ip_header: None,
            rate_limit: RateLimitPolicy::default(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            upstream_keys: UpstreamKeys::default(),
            endpoints: UpstreamEndpoints::default(),
            admob: AdMobConfig::default(),
            pin: PinConfig::default(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &if self.jwt_secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("min_app_version", &self.min_app_version)
            .field("client_ip_header", &self.client_ip_header)
            .field("rate_limit", &self.rate_limit)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("upstream_keys", &self.upstream_keys)
            .field("endpoints", &self.endpoints)
            .field("admob", &self.admob)
            .field("pin", &self.pin)
            .finish()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                   | Default                |
    /// |----------------------------|------------------------|
    /// | `BIND_ADDR`                | `0.0.0.0:8787`         |
    /// | `JWT_SECRET`               | unset                  |
    /// | `MIN_APP_VERSION`          | `1.0.0`                |
    /// | `CLIENT_IP_HEADER`         | unset (peer address)   |
    /// | `RATE_LIMIT_WINDOW_SECS`   | `900`, at most 1 year  |
    /// | `RATE_LIMIT_MAX_REQUESTS`  | `100`                  |
    /// | `UPSTREAM_TIMEOUT_SECS`    | `30`                   |
    /// | `GEMINI_API_KEY`, `KAKAO_API_KEY`, `OPEN_WEATHER_MAP_API_KEY` | unset |
    /// | `GEMINI_API_BASE`, `GEMINI_MODEL`, `KAKAO_LOCAL_URL`, `OPEN_WEATHER_URL` | production |
    /// | `ADMOB_{IOS,ANDROID}_{REWARDED,BANNER}` | blank     |
    /// | `GEMINI_UNIT_NAME`         | `US_PROXY`             |
    /// | `GEMINI_LOCATION_HINT`     | `wnam`                 |
    /// | `GEMINI_UNIT_URL`          | unset (in-process)     |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let text = |name: &str, default: String| var(name).unwrap_or(default);

        let rate_limit = RateLimitPolicy {
            window: var("RATE_LIMIT_WINDOW_SECS")
                .and_then(|v| parse_or_warn::<u64>("RATE_LIMIT_WINDOW_SECS", &v))
                .map(Duration::from_secs)
                .map(|window| {
                    if window > MAX_RATE_LIMIT_WINDOW {
                        warn!(?window, "clamping RATE_LIMIT_WINDOW_SECS to one year");
                    }
                    window.min(MAX_RATE_LIMIT_WINDOW)
                })
                .unwrap_or(defaults.rate_limit.window),
            max_requests: var("RATE_LIMIT_MAX_REQUESTS")
                .and_then(|v| parse_or_warn::<u32>("RATE_LIMIT_MAX_REQUESTS", &v))
                .unwrap_or(defaults.rate_limit.max_requests),
        };

        let upstream_timeout = var("UPSTREAM_TIMEOUT_SECS")
            .and_then(|v| parse_or_warn::<u64>("UPSTREAM_TIMEOUT_SECS", &v))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.upstream_timeout);

        let location_hint = var("GEMINI_LOCATION_HINT")
            .and_then(|v| match v.parse::<LocationHint>() {
                Ok(hint) => Some(hint),
                Err(e) => {
                    warn!(error = %e, "ignoring GEMINI_LOCATION_HINT");
                    None
                }
            })
            .unwrap_or(defaults.pin.location_hint);

        Self {
            bind_addr: text("BIND_ADDR", defaults.bind_addr),
            jwt_secret: text("JWT_SECRET", defaults.jwt_secret),
            min_app_version: text("MIN_APP_VERSION", defaults.min_app_version),
            client_ip_header: var("CLIENT_IP_HEADER").map(|h| h.trim().to_ascii_lowercase()),
            rate_limit,
            upstream_timeout,
            upstream_keys: UpstreamKeys {
                gemini: var("GEMINI_API_KEY"),
                kakao: var("KAKAO_API_KEY"),
                weather: var("OPEN_WEATHER_MAP_API_KEY"),
            },
            endpoints: UpstreamEndpoints {
                gemini_base: text("GEMINI_API_BASE", defaults.endpoints.gemini_base),
                gemini_model: text("GEMINI_MODEL", defaults.endpoints.gemini_model),
                kakao_local_url: text("KAKAO_LOCAL_URL", defaults.endpoints.kakao_local_url),
                weather_url: text("OPEN_WEATHER_URL", defaults.endpoints.weather_url),
            },
            admob: AdMobConfig {
                ios_rewarded: text("ADMOB_IOS_REWARDED", String::new()),
                ios_banner: text("ADMOB_IOS_BANNER", String::new()),
                android_rewarded: text("ADMOB_ANDROID_REWARDED", String::new()),
                android_banner: text("ADMOB_ANDROID_BANNER", String::new()),
            },
            pin: PinConfig {
                unit_name: text("GEMINI_UNIT_NAME", defaults.pin.unit_name),
                location_hint,
                unit_url: var("GEMINI_UNIT_URL"),
            },
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = raw, "ignoring unparsable value");
            None
        }
    }
}
