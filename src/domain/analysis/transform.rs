//! Series transforms requested by analyzers before rendering.

use serde_json::{json, Value as JsonValue};

use crate::domain::query::{Datapoint, Series};

pub const EXPAND: &str = "expand";

/// Applies a named transform. Unknown names return the series unchanged.
pub fn apply(series: &Series, transform: Option<&str>) -> Series {
    match transform {
        None => series.clone(),
        Some(EXPAND) => expand(series),
        Some(other) => {
            tracing::debug!(transform = %other, "Unrecognized transform");
            series.clone()
        }
    }
}

/// Turns the first datapoint's object value into one `{k, v}` row per key.
/// Arrays expand by index.
///
/// An empty series is returned as-is; a scalar value has no keys and
/// yields an empty series.
pub fn expand(series: &Series) -> Series {
    let Some(first) = series.first() else {
        return series.clone();
    };
    let row = |k: JsonValue, v: &JsonValue| Datapoint::new(first.t, json!({"k": k, "v": v}));
    let rows = match &first.d {
        JsonValue::Object(map) => map.iter().map(|(k, v)| row(json!(k), v)).collect(),
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| row(json!(i.to_string()), v))
            .collect(),
        _ => Vec::new(),
    };
    Series::new(rows)
}
