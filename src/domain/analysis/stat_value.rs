//! Values produced by memoized statistics.

use serde_json::Value as JsonValue;

/// Result of a statistic over one series.
///
/// Numbers stay `f64` so boundary results such as `NaN` survive intact
/// (a JSON number cannot hold them).
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Null,
    Number(f64),
    Count(usize),
    Bool(bool),
    Text(String),
    /// Sorted, de-duplicated keys.
    Keys(Vec<String>),
    Json(JsonValue),
}

impl StatValue {
    /// Numeric view: numbers and counts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Number(n) => Some(*n),
            StatValue::Count(c) => Some(*c as f64),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<usize> {
        match self {
            StatValue::Count(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StatValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_keys(&self) -> Option<&[String]> {
        match self {
            StatValue::Keys(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StatValue::Null)
    }

    /// JSON rendering; non-finite numbers become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            StatValue::Null => JsonValue::Null,
            StatValue::Number(n) => JsonValue::from(*n),
            StatValue::Count(c) => JsonValue::from(*c),
            StatValue::Bool(b) => JsonValue::Bool(*b),
            StatValue::Text(s) => JsonValue::String(s.clone()),
            StatValue::Keys(k) => JsonValue::from(k.clone()),
            StatValue::Json(v) => v.clone(),
        }
    }
}

impl From<f64> for StatValue {
    fn from(n: f64) -> Self {
        StatValue::Number(n)
    }
}

impl From<usize> for StatValue {
    fn from(c: usize) -> Self {
        StatValue::Count(c)
    }
}

impl From<bool> for StatValue {
    fn from(b: bool) -> Self {
        StatValue::Bool(b)
    }
}

impl From<&str> for StatValue {
    fn from(s: &str) -> Self {
        StatValue::Text(s.to_string())
    }
}

impl From<String> for StatValue {
    fn from(s: String) -> Self {
        StatValue::Text(s)
    }
}

impl From<JsonValue> for StatValue {
    fn from(v: JsonValue) -> Self {
        StatValue::Json(v)
    }
}
