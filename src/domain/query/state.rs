//! Query lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Where a query is in its fetch/process cycle.
///
/// Deactivation is not a state: it is a pending flag honored when the
/// in-flight operation settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    /// No usable output cached.
    Idle,
    /// Network fetch in flight.
    Fetching,
    /// Re-running the pipeline over cached data.
    Recomputing,
    /// Data and output both cached.
    Ready,
}

impl QueryState {
    /// True while an operation holds the single-flight marker.
    pub fn is_busy(&self) -> bool {
        matches!(self, QueryState::Fetching | QueryState::Recomputing)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryState::Idle => "idle",
            QueryState::Fetching => "fetching",
            QueryState::Recomputing => "recomputing",
            QueryState::Ready => "ready",
        };
        write!(f, "{}", s)
    }
}

impl StateMachine for QueryState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use QueryState::*;
        matches!(
            (self, target),
            (Idle, Fetching)
                | (Idle, Recomputing)
                | (Fetching, Ready)
                | (Fetching, Idle)
                | (Recomputing, Ready)
                | (Recomputing, Idle)
                | (Ready, Fetching)
                | (Ready, Recomputing)
                | (Ready, Idle)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use QueryState::*;
        match self {
            Idle => vec![Fetching, Recomputing],
            Fetching => vec![Ready, Idle],
            Recomputing => vec![Ready, Idle],
            Ready => vec![Fetching, Recomputing, Idle],
        }
    }
}
