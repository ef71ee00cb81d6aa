//! Query lifecycle and the engine that caches queries.

mod engine;
mod lifecycle;

pub use engine::QueryEngine;
pub use lifecycle::{
    IdleCallback, OutputCallback, Query, QueryOptions, QueryServices, StatusCallback,
    STATUS_PROCESSING, STATUS_QUERYING,
};
