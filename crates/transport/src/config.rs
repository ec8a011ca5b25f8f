//! Transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed delay between reconnect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Connection settings for one layer's transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// WebSocket endpoint of the aggregation service.
    pub ws_url: String,

    /// Base HTTP URL that resolved payloads are downloaded from.
    pub base_url: String,

    /// Delay before each reconnect attempt. Constant, no backoff.
    #[serde(with = "duration_ms", default = "default_retry_interval")]
    pub retry_interval: Duration,

    /// Timeout for payload downloads.
    #[serde(with = "duration_ms", default = "default_http_timeout")]
    pub http_timeout: Duration,
}

fn default_retry_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080/batch".to_string(),
            base_url: "http://localhost:8080".to_string(),
            retry_interval: default_retry_interval(),
            http_timeout: default_http_timeout(),
        }
    }
}

impl TransportConfig {
    /// Create from environment variables, falling back to defaults.
    ///
    /// - `TILE_WS_URL`
    /// - `TILE_BASE_URL`
    /// - `TILE_RETRY_INTERVAL_MS`
    /// - `TILE_HTTP_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ws_url = std::env::var("TILE_WS_URL").unwrap_or(defaults.ws_url);
        let base_url = std::env::var("TILE_BASE_URL").unwrap_or(defaults.base_url);

        let retry_interval = std::env::var("TILE_RETRY_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_interval);

        let http_timeout = std::env::var("TILE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Self {
            ws_url,
            base_url,
            retry_interval,
            http_timeout,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert!(config.ws_url.starts_with("ws://"));
    }

    #[test]
    fn test_deserialize_millis() {
        let config: TransportConfig = serde_json::from_str(
            r#"{"ws_url":"ws://agg:9000/ws","base_url":"http://agg:9000","retry_interval":250}"#,
        )
        .unwrap();
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }
}
