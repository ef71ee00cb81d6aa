//! QuerySpec - declarative description of a dataset query.
//!
//! A spec maps output names to elements. Each element references time-series
//! directly (`timeseries`), through a list of elements to merge (`merge`), or
//! through a nested named dataset (`dataset`). Any other keys (`t1`, `t2`,
//! `limit`, `transform`, ...) are passed to the backend untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::domain::foundation::{DomainError, ErrorCode};

/// One named element of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeseries: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<Vec<QueryElement>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<BTreeMap<String, QueryElement>>,

    /// Backend-interpreted options.
    #[serde(flatten)]
    pub options: BTreeMap<String, JsonValue>,
}

impl QueryElement {
    /// Element reading a single time-series.
    pub fn timeseries(id: impl Into<String>) -> Self {
        Self {
            timeseries: Some(id.into()),
            ..Default::default()
        }
    }

    /// Element merging several elements into one series.
    pub fn merge(elements: Vec<QueryElement>) -> Self {
        Self {
            merge: Some(elements),
            ..Default::default()
        }
    }

    /// Adds a backend option such as `t1` or `limit`.
    pub fn with_option(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Adds a nested dataset column.
    pub fn with_dataset(mut self, name: impl Into<String>, element: QueryElement) -> Self {
        self.dataset
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), element);
        self
    }

    fn collect_objects(&self, into: &mut BTreeSet<String>) {
        if let Some(id) = &self.timeseries {
            into.insert(id.clone());
        }
        if let Some(merge) = &self.merge {
            for element in merge {
                element.collect_objects(into);
            }
        }
        if let Some(dataset) = &self.dataset {
            for element in dataset.values() {
                element.collect_objects(into);
            }
        }
    }
}

/// A complete query: output name → element.
///
/// Equality is structural. Map-valued parts compare independently of key
/// order; `merge` lists compare in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySpec(BTreeMap<String, QueryElement>);

impl QuerySpec {
    /// Creates an empty spec. Use [`QuerySpec::with_element`] to populate it.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with_element(mut self, name: impl Into<String>, element: QueryElement) -> Self {
        self.0.insert(name.into(), element);
        self
    }

    /// Parses and validates a spec from JSON.
    pub fn from_value(value: JsonValue) -> Result<Self, DomainError> {
        let spec: QuerySpec = serde_json::from_value(value).map_err(|e| {
            DomainError::new(ErrorCode::InvalidQuerySpec, format!("Invalid query: {}", e))
        })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parses and validates a spec from YAML or JSON text.
    pub fn from_yaml_str(text: &str) -> Result<Self, DomainError> {
        let value: JsonValue = serde_yaml::from_str(text).map_err(|e| {
            DomainError::new(ErrorCode::InvalidQuerySpec, format!("Invalid query file: {}", e))
        })?;
        Self::from_value(value)
    }

    /// Reads a spec file. JSON files parse as YAML too.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DomainError::new(ErrorCode::InvalidQuerySpec, format!("Cannot read query file: {}", e))
                .with_detail("path", path.display().to_string())
        })?;
        Self::from_yaml_str(&text)
    }

    /// Rejects specs that name no outputs.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InvalidQuerySpec,
                "Query must contain at least one element",
            ));
        }
        Ok(())
    }

    /// All time-series identifiers referenced anywhere in the spec.
    pub fn objects(&self) -> BTreeSet<String> {
        let mut objects = BTreeSet::new();
        for element in self.0.values() {
            element.collect_objects(&mut objects);
        }
        objects
    }

    pub fn elements(&self) -> impl Iterator<Item = (&String, &QueryElement)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON body sent to the dataset endpoint.
    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}
