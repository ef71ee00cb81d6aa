//! Data table - tabular view of query results.
//!
//! [`DataTableAnalyzer`] proposes a `datatable` candidate whose config is one
//! [`TableConfig`] per series; [`DataTablePreprocessor`] turns that config
//! into rows.
//!
//! # Row props
//!
//! | prop      | value                                  |
//! |-----------|----------------------------------------|
//! | `t`       | timestamp                              |
//! | `dt`      | duration, when the point has one       |
//! | `d`       | raw value                              |
//! | `d_`      | raw value (object tables)              |
//! | `d_<key>` | one field of an object value           |
//! | `d_<i>`   | one element of an array value          |
//!
//! Arrays are tabulated like objects keyed by index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use super::transform::{self, EXPAND};
use super::{AccessorRegistry, AnalysisResults, Analyzer, Candidate, Preprocessor};
use crate::domain::foundation::DomainError;
use crate::domain::query::{Datapoint, QueryContext, Series};

pub const VISUALIZATION: &str = "datatable";
pub const TITLE: &str = "Data Table";
pub const WEIGHT: f64 = 20.0;

/// Default limit on the number of series shown as tables.
pub const DEFAULT_MAX_SERIES: usize = 6;
/// Series with this many points or more are not tabulated.
pub const DEFAULT_MAX_POINTS: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub prop: String,
    pub name: String,
}

impl Column {
    pub fn new(prop: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            name: name.into(),
        }
    }
}

/// Table layout for one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone)]
pub struct DataTableAnalyzer {
    max_series: usize,
    max_points: usize,
}

impl DataTableAnalyzer {
    pub fn new(max_series: usize, max_points: usize) -> Self {
        Self {
            max_series,
            max_points,
        }
    }

    fn accepts(&self, qdata: &QueryContext) -> bool {
        qdata.len() <= self.max_series
            && qdata
                .series()
                .iter()
                .all(|s| !s.is_empty() && s.len() < self.max_points)
    }

    fn table_for(&self, label: &str, series: &Series, accessors: &AccessorRegistry) -> TableConfig {
        if let [only] = series.points() {
            if field_names(&only.d).map_or(false, |names| names.len() > 1) {
                return TableConfig {
                    label: label.to_string(),
                    transform: Some(EXPAND.to_string()),
                    columns: vec![Column::new("d_k", "Key"), Column::new("d_v", "Value")],
                };
            }
        }

        let mut columns = vec![Column::new("t", "Timestamp")];
        if series.iter().any(|dp| dp.dt.is_some()) {
            columns.push(Column::new("dt", "Duration"));
        }

        let first_is_structured = series
            .first()
            .map_or(false, |dp| dp.d.is_null() || field_names(&dp.d).is_some());
        if !first_is_structured {
            columns.push(Column::new("d", "Data"));
        } else {
            let value = accessors.value();
            let names = match value.data_type(series).as_deref() {
                Some("object") if value.no_nulls(series) => Some(value.keys(series)),
                _ => structured_names(series),
            };
            match names {
                Some(names) => columns.extend(
                    names
                        .into_iter()
                        .map(|k| Column::new(format!("d_{}", k), k)),
                ),
                None => columns.push(Column::new("d_", "Data")),
            }
        }

        TableConfig {
            label: label.to_string(),
            transform: None,
            columns,
        }
    }
}

/// Object keys, or element indices for arrays. `None` for anything else.
fn field_names(d: &JsonValue) -> Option<Vec<String>> {
    match d {
        JsonValue::Object(map) => Some(map.keys().cloned().collect()),
        JsonValue::Array(items) => Some((0..items.len()).map(|i| i.to_string()).collect()),
        _ => None,
    }
}

/// Union of field names in first-seen order, `None` if any value is not
/// an object or array.
fn structured_names(series: &Series) -> Option<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for dp in series.iter() {
        for name in field_names(&dp.d)? {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Some(names)
}

impl Default for DataTableAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SERIES, DEFAULT_MAX_POINTS)
    }
}

#[async_trait]
impl Analyzer for DataTableAnalyzer {
    async fn analyze(
        &self,
        qdata: &QueryContext,
        accessors: &AccessorRegistry,
        _prior: &AnalysisResults,
    ) -> Result<AnalysisResults, DomainError> {
        let mut results = AnalysisResults::new();
        if !self.accepts(qdata) {
            tracing::debug!(series = qdata.len(), "Skipping data table for large dataset");
            return Ok(results);
        }

        let tables: Vec<TableConfig> = qdata
            .iter()
            .map(|(label, series)| self.table_for(label, series, accessors))
            .collect();
        let config = serde_json::to_value(&tables)
            .map_err(|e| DomainError::processing(format!("Failed to encode table config: {}", e)))?;

        results.insert(
            VISUALIZATION.to_string(),
            Candidate::new(WEIGHT, TITLE, VISUALIZATION, config),
        );
        Ok(results)
    }

    fn name(&self) -> &str {
        VISUALIZATION
    }
}

/// Builds `{tables: [{label, columns, rows}]}` from a data table candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataTablePreprocessor;

impl DataTablePreprocessor {
    fn row(dp: &Datapoint) -> JsonValue {
        let mut row = Map::new();
        row.insert("t".into(), json!(dp.t));
        if let Some(dt) = dp.dt {
            row.insert("dt".into(), json!(dt));
        }
        row.insert("d".into(), dp.d.clone());
        row.insert("d_".into(), dp.d.clone());
        match &dp.d {
            JsonValue::Object(fields) => {
                for (k, v) in fields {
                    row.insert(format!("d_{}", k), v.clone());
                }
            }
            JsonValue::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    row.insert(format!("d_{}", i), v.clone());
                }
            }
            _ => {}
        }
        JsonValue::Object(row)
    }
}

impl Preprocessor for DataTablePreprocessor {
    fn preprocess(
        &self,
        qdata: &QueryContext,
        candidate: &Candidate,
    ) -> Result<Map<String, JsonValue>, DomainError> {
        let tables: Vec<TableConfig> = serde_json::from_value(candidate.config.clone())
            .map_err(|e| DomainError::processing(format!("Invalid data table config: {}", e)))?;

        let mut rendered = Vec::with_capacity(tables.len());
        for table in tables {
            let rows: Vec<JsonValue> = match qdata.get(&table.label) {
                Some(series) => transform::apply(series, table.transform.as_deref())
                    .iter()
                    .map(Self::row)
                    .collect(),
                None => {
                    tracing::warn!(label = %table.label, "Data table references unknown series");
                    Vec::new()
                }
            };
            rendered.push(json!({
                "label": table.label,
                "columns": table.columns,
                "rows": rows,
            }));
        }

        let mut out = Map::new();
        out.insert("tables".into(), JsonValue::Array(rendered));
        Ok(out)
    }

    fn name(&self) -> &str {
        VISUALIZATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn context(entries: Vec<(&str, Vec<Datapoint>)>) -> QueryContext {
        let named: BTreeMap<String, Series> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), Series::new(v)))
            .collect();
        QueryContext::from_named(named)
    }

    fn points(ds: Vec<JsonValue>) -> Vec<Datapoint> {
        ds.into_iter()
            .enumerate()
            .map(|(i, d)| Datapoint::new(i as f64, d))
            .collect()
    }

    async fn tables(qdata: &QueryContext) -> Option<Vec<TableConfig>> {
        let results = DataTableAnalyzer::default()
            .analyze(qdata, &AccessorRegistry::new(), &AnalysisResults::new())
            .await
            .unwrap();
        results
            .get(VISUALIZATION)
            .map(|c| serde_json::from_value(c.config.clone()).unwrap())
    }

    fn props(table: &TableConfig) -> Vec<&str> {
        table.columns.iter().map(|c| c.prop.as_str()).collect()
    }

    #[tokio::test]
    async fn seven_series_produce_no_table() {
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        let qdata = context(names.iter().map(|n| (*n, points(vec![json!(1)]))).collect());
        assert!(tables(&qdata).await.is_none());
    }

    #[tokio::test]
    async fn empty_or_oversized_series_produce_no_table() {
        let qdata = context(vec![("a", points(vec![json!(1)])), ("b", vec![])]);
        assert!(tables(&qdata).await.is_none());

        let qdata = context(vec![("a", points(vec![json!(1); 3]))]);
        let results = DataTableAnalyzer::new(6, 3)
            .analyze(&qdata, &AccessorRegistry::new(), &AnalysisResults::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn candidate_metadata() {
        let qdata = context(vec![("a", points(vec![json!(1)]))]);
        let results = DataTableAnalyzer::default()
            .analyze(&qdata, &AccessorRegistry::new(), &AnalysisResults::new())
            .await
            .unwrap();
        let candidate = &results[VISUALIZATION];
        assert_eq!(candidate.weight, 20.0);
        assert_eq!(candidate.title, "Data Table");
        assert_eq!(candidate.visualization, "datatable");
    }

    #[tokio::test]
    async fn scalar_series_get_a_data_column() {
        let qdata = context(vec![("temp", points(vec![json!(1), json!(2)]))]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(t[0].label, "temp");
        assert_eq!(props(&t[0]), vec!["t", "d"]);
    }

    #[tokio::test]
    async fn duration_column_only_when_present() {
        let qdata = context(vec![(
            "a",
            vec![
                Datapoint::new(1.0, json!(1)),
                Datapoint::new(2.0, json!(2)).with_duration(5.0),
            ],
        )]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(props(&t[0]), vec!["t", "dt", "d"]);
    }

    #[tokio::test]
    async fn object_series_get_one_column_per_key() {
        let qdata = context(vec![(
            "a",
            points(vec![json!({"x": 1}), json!({"y": 2, "x": 3})]),
        )]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(props(&t[0]), vec!["t", "d_x", "d_y"]);
        assert_eq!(t[0].columns[1].name, "x");
    }

    #[tokio::test]
    async fn inconsistent_shapes_degrade_to_raw_column() {
        let qdata = context(vec![("a", points(vec![json!({"x": 1}), json!(4)]))]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(props(&t[0]), vec!["t", "d_"]);
    }

    #[tokio::test]
    async fn single_multi_key_point_requests_expand() {
        let qdata = context(vec![("a", points(vec![json!({"x": 1, "y": 2})]))]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(t[0].transform.as_deref(), Some("expand"));
        assert_eq!(props(&t[0]), vec!["d_k", "d_v"]);
    }

    #[tokio::test]
    async fn array_series_get_one_column_per_index() {
        let qdata = context(vec![(
            "a",
            points(vec![json!([1, 2]), json!([3, 4, 5])]),
        )]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(props(&t[0]), vec!["t", "d_0", "d_1", "d_2"]);
        assert_eq!(t[0].columns[3].name, "2");

        let config = serde_json::to_value(&t).unwrap();
        let candidate = Candidate::new(WEIGHT, TITLE, VISUALIZATION, config);
        let out = DataTablePreprocessor.preprocess(&qdata, &candidate).unwrap();
        assert_eq!(out["tables"][0]["rows"][1]["d_2"], json!(5));
        assert!(out["tables"][0]["rows"][0].get("d_2").is_none());
    }

    #[tokio::test]
    async fn arrays_and_objects_share_one_table() {
        let qdata = context(vec![("a", points(vec![json!({"x": 1}), json!([7])]))]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(props(&t[0]), vec!["t", "d_x", "d_0"]);
    }

    #[tokio::test]
    async fn single_multi_element_array_requests_expand() {
        let qdata = context(vec![("a", points(vec![json!(["p", "q"])]))]);
        let t = tables(&qdata).await.unwrap();
        assert_eq!(t[0].transform.as_deref(), Some("expand"));
    }

    #[tokio::test]
    async fn preprocessor_builds_rows() {
        let qdata = context(vec![
            ("a", points(vec![json!({"x": 1}), json!({"x": 2})])),
            ("b", points(vec![json!({"k1": "v1", "k2": "v2"})])),
        ]);
        let registry = AccessorRegistry::new();
        let results = DataTableAnalyzer::default()
            .analyze(&qdata, &registry, &AnalysisResults::new())
            .await
            .unwrap();
        let out = DataTablePreprocessor
            .preprocess(&qdata, &results[VISUALIZATION])
            .unwrap();

        let tables = out["tables"].as_array().unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0]["rows"][1]["d_x"], json!(2));
        assert_eq!(tables[0]["rows"][1]["t"], json!(1.0));

        let expanded = tables[1]["rows"].as_array().unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0]["d_k"], json!("k1"));
        assert_eq!(expanded[0]["d_v"], json!("v1"));
    }

    #[test]
    fn preprocessor_rejects_malformed_config() {
        let candidate = Candidate::new(WEIGHT, TITLE, VISUALIZATION, json!({"not": "a list"}));
        let err = DataTablePreprocessor
            .preprocess(&QueryContext::default(), &candidate)
            .unwrap_err();
        assert_eq!(err.code, crate::domain::foundation::ErrorCode::ProcessingFailed);
    }
}
