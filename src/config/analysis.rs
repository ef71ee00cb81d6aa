//! Analysis configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Limits for the built-in data table analyzer
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Most series shown as tables
    #[serde(default = "default_max_series")]
    pub table_max_series: usize,

    /// Series with this many points or more are not tabulated
    #[serde(default = "default_max_points")]
    pub table_max_points: usize,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table_max_series == 0 || self.table_max_points == 0 {
            return Err(ValidationError::InvalidTableLimits);
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            table_max_series: default_max_series(),
            table_max_points: default_max_points(),
        }
    }
}

fn default_max_series() -> usize {
    6
}

fn default_max_points() -> usize {
    50_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_config_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.table_max_series, 6);
        assert_eq!(config.table_max_points, 50_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let config = AnalysisConfig {
            table_max_series: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTableLimits));
    }
}
