//! Event channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const EVENTS_PATH: &str = "api/events";

/// Event channel (WebSocket) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Explicit `ws://`/`wss://` URL; derived from the API URL when unset
    #[serde(default)]
    pub url: Option<String>,

    /// User named in the subscribe command; reconnection needs one
    #[serde(default)]
    pub username: Option<String>,

    /// Reconnect after the channel closes
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_ms: u64,

    /// Added to the delay after each failed attempt, in milliseconds
    #[serde(default = "default_retry_delta")]
    pub retry_delta_ms: u64,
}

impl TransportConfig {
    /// Event channel URL: the override, or the API URL with `ws`/`wss`
    /// scheme and `api/events` appended to its path.
    pub fn events_url(&self, api_base_url: &str) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let ws = if let Some(rest) = api_base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = api_base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            api_base_url.to_string()
        };
        format!("{}/{}", ws.trim_end_matches('/'), EVENTS_PATH)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn retry_delta(&self) -> Duration {
        Duration::from_millis(self.retry_delta_ms)
    }

    /// Validate transport configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ValidationError::InvalidTransportUrl);
            }
        }
        if self.reset_timeout_ms == 0 {
            return Err(ValidationError::InvalidBackoff);
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            reconnect: default_reconnect(),
            reset_timeout_ms: default_reset_timeout(),
            retry_delta_ms: default_retry_delta(),
        }
    }
}

fn default_reconnect() -> bool {
    true
}

fn default_reset_timeout() -> u64 {
    200
}

fn default_retry_delta() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::default();
        assert!(config.reconnect);
        assert_eq!(config.reset_timeout(), Duration::from_millis(200));
        assert_eq!(config.retry_delta(), Duration::from_millis(1000));
    }

    #[test]
    fn test_events_url_derived_from_api_url() {
        let config = TransportConfig::default();
        assert_eq!(
            config.events_url("http://localhost:1324/"),
            "ws://localhost:1324/api/events"
        );
        assert_eq!(
            config.events_url("https://heedy.example.com/app"),
            "wss://heedy.example.com/app/api/events"
        );
    }

    #[test]
    fn test_events_url_override() {
        let config = TransportConfig {
            url: Some("wss://events.example.com/stream".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.events_url("http://ignored"),
            "wss://events.example.com/stream"
        );
    }

    #[test]
    fn test_validation_rejects_http_override() {
        let config = TransportConfig {
            url: Some("http://localhost/api/events".to_string()),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTransportUrl));
    }

    #[test]
    fn test_validation_rejects_zero_backoff() {
        let config = TransportConfig {
            reset_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBackoff));
    }
}
