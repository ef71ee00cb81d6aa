//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid API base URL (must be http:// or https://)")]
    InvalidApiUrl,

    #[error("Invalid request timeout (must be 1-300 seconds)")]
    InvalidTimeout,

    #[error("Invalid event channel URL (must be ws:// or wss://)")]
    InvalidTransportUrl,

    #[error("Invalid reconnect backoff")]
    InvalidBackoff,

    #[error("Data table limits must be greater than zero")]
    InvalidTableLimits,

    #[error("At least one data event name is required")]
    NoDataEvents,
}
