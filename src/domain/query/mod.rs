//! Query Module - specs, fetched data, and lifecycle status.
//!
//! # Components
//!
//! - `QuerySpec` / `QueryElement` - Declarative dataset description
//! - `Datapoint` / `Series` - Fetched data with stable array identity
//! - `QueryContext` - The fetched dataset as seen by the pipeline
//! - `QueryState` - Lifecycle status state machine

mod context;
mod datapoint;
mod spec;
mod state;

pub use context::QueryContext;
pub use datapoint::{Datapoint, Series};
pub use spec::{QueryElement, QuerySpec};
pub use state::QueryState;
