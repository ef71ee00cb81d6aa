//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `TSQUERY_` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use timeseries_query::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Events from {}", config.events_url());
//! ```

mod analysis;
mod api;
mod error;
mod query;
mod transport;

pub use analysis::AnalysisConfig;
pub use api::ApiConfig;
pub use error::{ConfigError, ValidationError};
pub use query::QueryConfig;
pub use transport::TransportConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Backend API configuration (base URL, token)
    pub api: ApiConfig,

    /// Event channel configuration (URL, user, backoff)
    #[serde(default)]
    pub transport: TransportConfig,

    /// Data table limits
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Dataset endpoint and invalidating events
    #[serde(default)]
    pub query: QueryConfig,

    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub log_json: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `TSQUERY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `TSQUERY__API__BASE_URL=http://localhost:1324/` -> `api.base_url`
    /// - `TSQUERY__TRANSPORT__USERNAME=alice` -> `transport.username`
    /// - `TSQUERY__QUERY__DATA_EVENTS=a,b` -> `query.data_events = ["a", "b"]`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("TSQUERY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("query.data_events")
                    .with_list_parse_key("query.object_events"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api.validate()?;
        self.transport.validate()?;
        self.analysis.validate()?;
        self.query.validate()?;
        Ok(())
    }

    /// Event channel URL, derived from the API URL unless overridden
    pub fn events_url(&self) -> String {
        self.transport.events_url(&self.api.base_url)
    }
}

fn default_log_level() -> String {
    "info,timeseries_query=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("TSQUERY__API__BASE_URL", "http://localhost:1324/");
    }

    fn clear_env() {
        for key in [
            "TSQUERY__API__BASE_URL",
            "TSQUERY__API__TOKEN",
            "TSQUERY__TRANSPORT__USERNAME",
            "TSQUERY__TRANSPORT__RECONNECT",
            "TSQUERY__QUERY__DATA_EVENTS",
            "TSQUERY__LOG_JSON",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.api.base_url, "http://localhost:1324/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.log_level, "info,timeseries_query=debug");
        assert!(!config.log_json);
        assert!(config.transport.reconnect);
        assert_eq!(config.analysis.table_max_series, 6);
        assert_eq!(config.query.object_events, vec!["object_update"]);
        assert_eq!(config.events_url(), "ws://localhost:1324/api/events");
    }

    #[test]
    fn test_missing_api_url_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }

    #[test]
    fn test_overrides_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("TSQUERY__API__TOKEN", "s3cret");
        env::set_var("TSQUERY__TRANSPORT__USERNAME", "alice");
        env::set_var("TSQUERY__TRANSPORT__RECONNECT", "false");
        env::set_var("TSQUERY__QUERY__DATA_EVENTS", "timeseries_data_write,custom_event");
        env::set_var("TSQUERY__LOG_JSON", "true");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.api.has_token());
        assert_eq!(config.transport.username.as_deref(), Some("alice"));
        assert!(!config.transport.reconnect);
        assert_eq!(
            config.query.data_events,
            vec!["timeseries_data_write", "custom_event"]
        );
        assert!(config.log_json);
    }
}
