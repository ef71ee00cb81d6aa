//! Analyzer candidates and final render output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// A proposed way to render a dataset, before preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Ordering hint: higher weights are shown first.
    pub weight: f64,
    pub title: String,
    /// Visualization tag used to pick a preprocessor.
    pub visualization: String,
    /// Analyzer-specific configuration.
    #[serde(default)]
    pub config: JsonValue,
}

impl Candidate {
    pub fn new(
        weight: f64,
        title: impl Into<String>,
        visualization: impl Into<String>,
        config: JsonValue,
    ) -> Self {
        Self {
            weight,
            title: title.into(),
            visualization: visualization.into(),
            config,
        }
    }
}

/// Named candidates accumulated across analyzers.
pub type AnalysisResults = BTreeMap<String, Candidate>;

/// Preprocessor result plus the candidate that produced it.
///
/// Serializes as the preprocessor's object with a `config` field holding
/// the candidate; a `config` key returned by the preprocessor is replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputEntry {
    #[serde(flatten)]
    pub render: Map<String, JsonValue>,
    pub config: Candidate,
}

impl OutputEntry {
    pub fn new(mut render: Map<String, JsonValue>, candidate: Candidate) -> Self {
        render.remove("config");
        Self {
            render,
            config: candidate,
        }
    }
}

/// Final renderable output, keyed like the analysis results.
pub type QueryOutput = BTreeMap<String, OutputEntry>;
