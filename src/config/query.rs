//! Query configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Dataset endpoint and the events that invalidate query results
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Path of the dataset endpoint, relative to the API base URL
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,

    /// Events that trigger a re-fetch
    #[serde(default = "default_data_events")]
    pub data_events: Vec<String>,

    /// Events that trigger reprocessing of cached data
    #[serde(default = "default_object_events")]
    pub object_events: Vec<String>,
}

impl QueryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dataset_path.is_empty() {
            return Err(ValidationError::MissingRequired("TSQUERY__QUERY__DATASET_PATH"));
        }
        if self.data_events.is_empty() {
            return Err(ValidationError::NoDataEvents);
        }
        Ok(())
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            data_events: default_data_events(),
            object_events: default_object_events(),
        }
    }
}

fn default_dataset_path() -> String {
    "api/timeseries/dataset".to_string()
}

fn default_data_events() -> Vec<String> {
    vec![
        "timeseries_data_write".to_string(),
        "timeseries_actions_write".to_string(),
        "timeseries_data_delete".to_string(),
    ]
}

fn default_object_events() -> Vec<String> {
    vec!["object_update".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_config_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.dataset_path, "api/timeseries/dataset");
        assert_eq!(config.data_events.len(), 3);
        assert_eq!(config.object_events, vec!["object_update"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_requires_data_events() {
        let config = QueryConfig {
            data_events: vec![],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::NoDataEvents));
    }
}
