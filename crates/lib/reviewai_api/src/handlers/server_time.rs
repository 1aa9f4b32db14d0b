use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::ServerTimeResponse;

/// `GET /api/server-time`
pub async fn server_time_handler() -> Json<ServerTimeResponse> {
    Json(server_time_at(Utc::now()))
}

fn server_time_at(now: DateTime<Utc>) -> ServerTimeResponse {
    ServerTimeResponse {
        server_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        timestamp: now.timestamp_millis(),
        timezone: "UTC".into(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn formats_with_millis_and_z() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let resp = server_time_at(now);
        assert_eq!(resp.server_time, "2023-11-14T22:13:20.123Z");
        assert_eq!(resp.timestamp, 1_700_000_000_123);
        assert_eq!(resp.timezone, "UTC");
    }
}
