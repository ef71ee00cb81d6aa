//! Built-in statistics registered on every accessor.

use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{FieldAccessor, StatFn, StatValue};
use crate::domain::query::Series;

pub const KEYS: &str = "keys";
pub const DATA_TYPE: &str = "dataType";
pub const MIN: &str = "min";
pub const MAX: &str = "max";
pub const SUM: &str = "sum";
pub const NON_NULL: &str = "nonNull";
pub const STDDEV: &str = "stddev";

/// Name → function table used to seed a fresh registry.
pub(crate) static BUILTIN_STATS: Lazy<Vec<(&'static str, StatFn)>> = Lazy::new(|| {
    vec![
        (KEYS, Arc::new(keys) as StatFn),
        (DATA_TYPE, Arc::new(data_type) as StatFn),
        (MIN, Arc::new(min) as StatFn),
        (MAX, Arc::new(max) as StatFn),
        (SUM, Arc::new(sum) as StatFn),
        (NON_NULL, Arc::new(non_null) as StatFn),
        (STDDEV, Arc::new(stddev) as StatFn),
    ]
});

pub fn keys(f: &FieldAccessor, series: &Series) -> StatValue {
    let mut keys = BTreeSet::new();
    for dp in series.iter() {
        if let Some(value) = f.extract(dp) {
            if let JsonValue::Object(map) = value.as_ref() {
                keys.extend(map.keys().cloned());
            }
        }
    }
    StatValue::Keys(keys.into_iter().collect())
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

pub fn data_type(f: &FieldAccessor, series: &Series) -> StatValue {
    let mut found: Option<&'static str> = None;
    for dp in series.iter() {
        let Some(value) = f.extract(dp) else {
            continue;
        };
        let t = type_name(value.as_ref());
        match found {
            None => found = Some(t),
            Some(prev) if prev != t => return StatValue::from("mixed"),
            Some(_) => {}
        }
    }
    found.map(StatValue::from).unwrap_or(StatValue::Null)
}

pub fn min(f: &FieldAccessor, series: &Series) -> StatValue {
    series
        .iter()
        .filter_map(|dp| f.number(dp))
        .reduce(f64::min)
        .map(StatValue::Number)
        .unwrap_or(StatValue::Null)
}

pub fn max(f: &FieldAccessor, series: &Series) -> StatValue {
    series
        .iter()
        .filter_map(|dp| f.number(dp))
        .reduce(f64::max)
        .map(StatValue::Number)
        .unwrap_or(StatValue::Null)
}

pub fn sum(f: &FieldAccessor, series: &Series) -> StatValue {
    StatValue::Number(series.iter().filter_map(|dp| f.number(dp)).sum())
}

pub fn non_null(f: &FieldAccessor, series: &Series) -> StatValue {
    StatValue::Count(series.iter().filter(|dp| f.extract(dp).is_some()).count())
}

/// Sample standard deviation around the memoized mean.
///
/// Divides by `nonNull - 1` unconditionally; at `nonNull <= 1` the result is
/// whatever IEEE arithmetic yields.
pub fn stddev(f: &FieldAccessor, series: &Series) -> StatValue {
    let mu = f.mean(series);
    let squares: f64 = series
        .iter()
        .filter_map(|dp| f.number(dp))
        .map(|v| (v - mu).powi(2))
        .sum();
    StatValue::Number((squares / (f.non_null(series) as f64 - 1.0)).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::Datapoint;
    use serde_json::json;

    fn value_accessor() -> FieldAccessor {
        FieldAccessor::new(vec!["d".to_string()])
    }

    fn series(ds: Vec<JsonValue>) -> Series {
        Series::new(
            ds.into_iter()
                .enumerate()
                .map(|(i, d)| Datapoint::new(i as f64 + 1.0, d))
                .collect(),
        )
    }

    #[test]
    fn statistics_over_values_with_a_null() {
        let f = value_accessor();
        let s = series(vec![json!(2), json!(4), JsonValue::Null]);

        assert_eq!(f.non_null(&s), 2);
        assert_eq!(f.sum(&s), 6.0);
        assert_eq!(f.mean(&s), 3.0);
        assert_eq!(f.min(&s), Some(2.0));
        assert_eq!(f.max(&s), Some(4.0));
        assert!((f.stddev(&s) - 2f64.sqrt()).abs() < 1e-12);
        assert!(!f.no_nulls(&s));
    }

    #[test]
    fn stddev_with_single_value_is_nan() {
        let f = value_accessor();
        assert!(f.stddev(&series(vec![json!(5)])).is_nan());
    }

    #[test]
    fn min_max_of_non_numeric_are_none() {
        let f = value_accessor();
        let s = series(vec![json!("a"), json!("b")]);
        assert_eq!(f.min(&s), None);
        assert_eq!(f.max(&s), None);
        assert_eq!(f.sum(&s), 0.0);
    }

    #[test]
    fn keys_unions_object_items() {
        let f = value_accessor();
        let s = series(vec![json!({"b": 1, "a": 2}), json!(3), json!({"c": 1, "a": 0})]);
        assert_eq!(f.keys(&s), vec!["a", "b", "c"]);
    }

    #[test]
    fn data_type_detects_common_and_mixed_types() {
        let f = value_accessor();
        assert_eq!(
            f.data_type(&series(vec![json!(1), JsonValue::Null, json!(2.5)])).as_deref(),
            Some("number")
        );
        assert_eq!(
            f.data_type(&series(vec![json!(1), json!("x")])).as_deref(),
            Some("mixed")
        );
        assert_eq!(f.data_type(&series(vec![JsonValue::Null])), None);
    }

    #[test]
    fn numeric_and_boolean_predicates() {
        let f = value_accessor();
        let bools = series(vec![json!(true), json!(false)]);
        assert!(f.is_boolean(&bools));
        assert!(f.is_numeric(&bools));
        assert_eq!(f.sum(&bools), 1.0);

        let strings = series(vec![json!("x")]);
        assert!(!f.is_numeric(&strings));
        assert!(f.no_nulls(&strings));
    }

    #[test]
    fn builtin_table_names_every_statistic() {
        let names: Vec<&str> = BUILTIN_STATS.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec![KEYS, DATA_TYPE, MIN, MAX, SUM, NON_NULL, STDDEV]);
    }
}
