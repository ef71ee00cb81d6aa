//! Datapoints and identity-carrying series arrays.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// A single time-series entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Timestamp (unix seconds, fractional).
    pub t: f64,

    /// Value: a scalar or an object.
    #[serde(default)]
    pub d: JsonValue,

    /// Optional duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
}

impl Datapoint {
    pub fn new(t: f64, d: JsonValue) -> Self {
        Self { t, d, dt: None }
    }

    pub fn with_duration(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }
}

/// An immutable, shared array of datapoints with a stable identity.
///
/// Clones share the same allocation and therefore the same identity. Two
/// series built from equal datapoints are still distinct instances, so
/// statistics memoized for one are never served for the other.
#[derive(Clone)]
pub struct Series(Arc<[Datapoint]>);

impl Series {
    pub fn new(points: Vec<Datapoint>) -> Self {
        Self(points.into())
    }

    /// Address of the shared allocation. Stable while any clone is alive.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }

    /// Non-owning handle used by statistic caches.
    pub fn downgrade(&self) -> Weak<[Datapoint]> {
        Arc::downgrade(&self.0)
    }

    pub fn points(&self) -> &[Datapoint] {
        &self.0
    }

    pub fn same_instance(&self, other: &Series) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Series {
    type Target = [Datapoint];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl PartialEq for Series {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl From<Vec<Datapoint>> for Series {
    fn from(points: Vec<Datapoint>) -> Self {
        Self::new(points)
    }
}

impl Serialize for Series {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Series {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Datapoint>::deserialize(deserializer).map(Series::new)
    }
}
