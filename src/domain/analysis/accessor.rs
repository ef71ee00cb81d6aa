//! FieldAccessor - a path into a datapoint with memoized per-series statistics.
//!
//! # Cache layout
//!
//! ```text
//! FieldAccessor("d")
//!   stats:  "min" -> fn, "max" -> fn, ...
//!   cache:  series@0x7f..10 (weak) -> { "min": 2, "sum": 6 }
//!           series@0x7f..80 (weak) -> { "keys": [a, b] }
//! ```
//!
//! Entries hold only a `Weak` handle to their series, so the cache never
//! keeps a series alive. An entry whose series has been dropped is removed
//! when a lookup lands on it, when any new series is inserted, and when
//! [`FieldAccessor::cached_series`] is asked.

use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use super::{stats, StatValue};
use crate::domain::query::{Datapoint, Series};

/// A registered statistic: `(accessor, series) -> value`.
pub type StatFn = Arc<dyn Fn(&FieldAccessor, &Series) -> StatValue + Send + Sync>;

struct CacheEntry {
    series: Weak<[Datapoint]>,
    values: HashMap<String, StatValue>,
}

#[derive(Default)]
struct StatCache {
    entries: HashMap<usize, CacheEntry>,
}

impl StatCache {
    fn lookup(&mut self, series: &Series, name: &str) -> Option<StatValue> {
        let id = series.identity();
        // A dead entry at this address belonged to a freed series.
        if self.entries.get(&id)?.series.strong_count() == 0 {
            self.entries.remove(&id);
            return None;
        }
        self.entries.get(&id)?.values.get(name).cloned()
    }

    fn insert(&mut self, series: &Series, name: &str, value: StatValue) -> StatValue {
        let id = series.identity();
        let stale = self
            .entries
            .get(&id)
            .map(|e| e.series.strong_count() == 0)
            .unwrap_or(true);
        if stale {
            self.purge();
            self.entries.insert(
                id,
                CacheEntry {
                    series: series.downgrade(),
                    values: HashMap::new(),
                },
            );
        }
        match self.entries.get_mut(&id) {
            Some(entry) => entry
                .values
                .entry(name.to_string())
                .or_insert(value)
                .clone(),
            None => value,
        }
    }

    fn forget(&mut self, name: &str) {
        for entry in self.entries.values_mut() {
            entry.values.remove(name);
        }
    }

    /// Drops entries whose series is gone.
    fn purge(&mut self) {
        self.entries.retain(|_, e| e.series.strong_count() > 0);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Extracts one field from datapoints and memoizes statistics over series.
///
/// Built by an [`super::AccessorRegistry`], which attaches every registered
/// statistic. Statistics are read with [`FieldAccessor::stat`] or the typed
/// helpers (`min`, `sum`, `mean`, ...).
pub struct FieldAccessor {
    path: Vec<String>,
    default: Option<JsonValue>,
    stats: RwLock<HashMap<String, StatFn>>,
    cache: Mutex<StatCache>,
}

impl FieldAccessor {
    /// Accessor for `path`, with no statistics attached.
    pub fn new(path: Vec<String>) -> Self {
        Self {
            path,
            default: None,
            stats: RwLock::new(HashMap::new()),
            cache: Mutex::new(StatCache::default()),
        }
    }

    /// Value returned when the path resolves to nothing.
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Walks the path into a datapoint.
    ///
    /// Returns `None` when any segment is missing or null.
    pub fn extract<'a>(&self, dp: &'a Datapoint) -> Option<Cow<'a, JsonValue>> {
        self.walk(dp).or_else(|| self.default.clone().map(Cow::Owned))
    }

    fn walk<'a>(&self, dp: &'a Datapoint) -> Option<Cow<'a, JsonValue>> {
        let (head, tail) = self.path.split_first()?;
        let mut current: Cow<'a, JsonValue> = match head.as_str() {
            "t" => Cow::Owned(JsonValue::from(dp.t)),
            "d" => Cow::Borrowed(&dp.d),
            "dt" => Cow::Owned(JsonValue::from(dp.dt?)),
            _ => return None,
        };
        for segment in tail {
            current = match current {
                Cow::Borrowed(v) => Cow::Borrowed(child(v, segment)?),
                Cow::Owned(v) => Cow::Owned(child(&v, segment)?.clone()),
            };
        }
        if current.is_null() {
            return None;
        }
        Some(current)
    }

    /// Numeric view of the extracted value; booleans count as 0/1.
    pub fn number(&self, dp: &Datapoint) -> Option<f64> {
        match self.extract(dp)?.as_ref() {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Memoized `compute(self, series)` under `name`.
    ///
    /// The first call per `(name, series instance)` computes; later calls
    /// return the stored value. The lock is not held while computing, so a
    /// statistic may itself read other statistics.
    pub fn get<F>(&self, name: &str, compute: F, series: &Series) -> StatValue
    where
        F: FnOnce(&FieldAccessor, &Series) -> StatValue,
    {
        if let Some(hit) = self.lock_cache().lookup(series, name) {
            return hit;
        }
        let value = compute(self, series);
        self.lock_cache().insert(series, name, value)
    }

    /// Memoized value of a registered statistic, or `None` if `name` is unknown.
    pub fn stat(&self, name: &str, series: &Series) -> Option<StatValue> {
        let f = self.stat_fn(name)?;
        Some(self.get(name, |a, s| f(a, s), series))
    }

    pub fn has_stat(&self, name: &str) -> bool {
        self.stat_fn(name).is_some()
    }

    /// Attaches (or replaces) a statistic. Replacing drops values cached under `name`.
    pub(crate) fn attach(&self, name: &str, f: StatFn) {
        let replaced = self
            .stats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), f)
            .is_some();
        if replaced {
            self.lock_cache().forget(name);
        }
    }

    /// Number of series with a live cache entry. Dead entries are purged.
    pub fn cached_series(&self) -> usize {
        let mut cache = self.lock_cache();
        cache.purge();
        cache.len()
    }

    /// Number of cache slots, including dead ones not yet purged.
    pub fn cache_slots(&self) -> usize {
        self.lock_cache().len()
    }

    fn stat_fn(&self, name: &str) -> Option<StatFn> {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, StatCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn builtin(&self, name: &str, fallback: fn(&FieldAccessor, &Series) -> StatValue, series: &Series) -> StatValue {
        match self.stat_fn(name) {
            Some(f) => self.get(name, |a, s| f(a, s), series),
            None => self.get(name, fallback, series),
        }
    }

    // === Built-in statistics ===

    /// Sorted union of keys across object-valued items.
    pub fn keys(&self, series: &Series) -> Vec<String> {
        self.builtin(stats::KEYS, stats::keys, series)
            .as_keys()
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Common type of the non-null values (`number`, `boolean`, `string`,
    /// `object`, `array`), `mixed` if they disagree, `None` if all are null.
    pub fn data_type(&self, series: &Series) -> Option<String> {
        self.builtin(stats::DATA_TYPE, stats::data_type, series)
            .as_str()
            .map(str::to_string)
    }

    pub fn min(&self, series: &Series) -> Option<f64> {
        self.builtin(stats::MIN, stats::min, series).as_f64()
    }

    pub fn max(&self, series: &Series) -> Option<f64> {
        self.builtin(stats::MAX, stats::max, series).as_f64()
    }

    pub fn sum(&self, series: &Series) -> f64 {
        self.builtin(stats::SUM, stats::sum, series)
            .as_f64()
            .unwrap_or(0.0)
    }

    pub fn non_null(&self, series: &Series) -> usize {
        self.builtin(stats::NON_NULL, stats::non_null, series)
            .as_f64()
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    /// Sample standard deviation (divides by `non_null - 1`).
    ///
    /// With one or zero non-null values the result is `NaN` or `-0.0`.
    pub fn stddev(&self, series: &Series) -> f64 {
        self.builtin(stats::STDDEV, stats::stddev, series)
            .as_f64()
            .unwrap_or(f64::NAN)
    }

    // === Derived (not memoized directly) ===

    pub fn mean(&self, series: &Series) -> f64 {
        self.sum(series) / self.non_null(series) as f64
    }

    pub fn no_nulls(&self, series: &Series) -> bool {
        self.non_null(series) == series.len()
    }

    pub fn is_numeric(&self, series: &Series) -> bool {
        matches!(self.data_type(series).as_deref(), Some("number") | Some("boolean"))
    }

    pub fn is_boolean(&self, series: &Series) -> bool {
        self.data_type(series).as_deref() == Some("boolean")
    }
}

fn child<'v>(value: &'v JsonValue, segment: &str) -> Option<&'v JsonValue> {
    match value {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("path", &self.path)
            .field("default", &self.default)
            .finish()
    }
}
