//! QueryContext - fetched dataset wrapped for the analysis pipeline.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::Series;
use crate::domain::foundation::DomainError;

/// Raw result of a dataset query: one series per output name.
///
/// Names are kept in sorted order so a given response always yields the
/// same context layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    keys: Vec<String>,
    series: Vec<Series>,
}

impl QueryContext {
    /// Builds a context from the `data` field of a dataset response.
    pub fn from_response(data: JsonValue) -> Result<Self, DomainError> {
        let named: BTreeMap<String, Series> = serde_json::from_value(data)
            .map_err(|e| DomainError::fetch(format!("Malformed dataset response: {}", e)))?;
        Ok(Self::from_named(named))
    }

    pub fn from_named(named: BTreeMap<String, Series>) -> Self {
        let (keys, series) = named.into_iter().unzip();
        Self { keys, series }
    }

    /// Output names, aligned with [`QueryContext::series`].
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.keys
            .iter()
            .position(|k| k == name)
            .map(|i| &self.series[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Series)> {
        self.keys.iter().zip(self.series.iter())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
