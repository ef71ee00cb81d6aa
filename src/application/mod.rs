//! Application layer - query lifecycle and analysis orchestration.
//!
//! This layer composes the domain (specs, accessors, analyzers) with the
//! ports (API client, event subscriber) into live, self-refreshing queries.

pub mod pipeline;
pub mod query;

pub use pipeline::AnalysisPipeline;
pub use query::{
    IdleCallback, OutputCallback, Query, QueryEngine, QueryOptions, QueryServices,
    StatusCallback,
};
