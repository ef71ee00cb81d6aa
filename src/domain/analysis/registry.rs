//! AccessorRegistry - statistic registry and accessor factory.
//!
//! Owns the table of named statistics and every accessor it has produced:
//! the canonical value (`d`), timestamp (`t`) and duration (`dt`, default 0)
//! accessors, plus one memoized accessor per distinct path. Registering a
//! statistic attaches it to all of them.

use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use super::stats::BUILTIN_STATS;
use super::{FieldAccessor, StatFn, StatValue};
use crate::domain::query::Series;

pub struct AccessorRegistry {
    stats: RwLock<BTreeMap<String, StatFn>>,
    value: Arc<FieldAccessor>,
    timestamp: Arc<FieldAccessor>,
    duration: Arc<FieldAccessor>,
    paths: RwLock<HashMap<String, Arc<FieldAccessor>>>,
}

impl AccessorRegistry {
    /// Registry seeded with the built-in statistics.
    pub fn new() -> Self {
        let stats: BTreeMap<String, StatFn> = BUILTIN_STATS
            .iter()
            .map(|(name, f)| (name.to_string(), Arc::clone(f)))
            .collect();

        let value = Arc::new(with_stats(FieldAccessor::new(vec!["d".into()]), &stats));
        let timestamp = Arc::new(with_stats(FieldAccessor::new(vec!["t".into()]), &stats));
        let duration = Arc::new(with_stats(
            FieldAccessor::new(vec!["dt".into()]).with_default(json!(0)),
            &stats,
        ));

        Self {
            stats: RwLock::new(stats),
            value,
            timestamp,
            duration,
            paths: RwLock::new(HashMap::new()),
        }
    }

    /// Canonical accessor for `d`.
    pub fn value(&self) -> &Arc<FieldAccessor> {
        &self.value
    }

    /// Canonical accessor for `t`.
    pub fn timestamp(&self) -> &Arc<FieldAccessor> {
        &self.timestamp
    }

    /// Canonical accessor for `dt`; absent durations read as 0.
    pub fn duration(&self) -> &Arc<FieldAccessor> {
        &self.duration
    }

    /// Accessor for an arbitrary path, e.g. `["d", "temperature"]`.
    ///
    /// Single-segment `d`/`t`/`dt` paths return the canonical accessors.
    /// Any other path is built once and shared, so its cache is shared too.
    pub fn accessor<S: AsRef<str>>(&self, path: &[S]) -> Arc<FieldAccessor> {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        if let [single] = path.as_slice() {
            match single.as_str() {
                "d" => return Arc::clone(&self.value),
                "t" => return Arc::clone(&self.timestamp),
                "dt" => return Arc::clone(&self.duration),
                _ => {}
            }
        }

        let key = serde_json::to_string(&path).unwrap_or_else(|_| path.join("\u{1f}"));
        if let Some(existing) = self.read_paths().get(&key) {
            return Arc::clone(existing);
        }

        // Built under the write lock so a concurrent registration either sees
        // this accessor or is seen by it.
        let mut paths = self.paths.write().unwrap_or_else(PoisonError::into_inner);
        let accessor = paths.entry(key).or_insert_with(|| {
            let stats = self.stats.read().unwrap_or_else(PoisonError::into_inner);
            Arc::new(with_stats(FieldAccessor::new(path), &stats))
        });
        Arc::clone(accessor)
    }

    /// Registers a statistic and attaches it to every existing accessor.
    pub fn set_query_prop<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&FieldAccessor, &Series) -> StatValue + Send + Sync + 'static,
    {
        let name = name.into();
        let f: StatFn = Arc::new(f);
        self.stats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Arc::clone(&f));
        self.attach_all(&name, &f);
        tracing::debug!(stat = %name, "Registered query statistic");
    }

    fn attach_all(&self, name: &str, f: &StatFn) {
        self.value.attach(name, Arc::clone(f));
        self.timestamp.attach(name, Arc::clone(f));
        self.duration.attach(name, Arc::clone(f));
        for accessor in self.read_paths().values() {
            accessor.attach(name, Arc::clone(f));
        }
    }

    /// Names of all registered statistics, sorted.
    pub fn statistics(&self) -> Vec<String> {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn read_paths(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<FieldAccessor>>> {
        self.paths.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AccessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn with_stats(accessor: FieldAccessor, stats: &BTreeMap<String, StatFn>) -> FieldAccessor {
    for (name, f) in stats {
        accessor.attach(name, Arc::clone(f));
    }
    accessor
}
