//! Domain layer containing query and analysis logic.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, events, errors)
//! - `query` - Query specs, fetched datasets and the query state machine
//! - `analysis` - Field accessors, statistics, analyzers and preprocessors

pub mod analysis;
pub mod foundation;
pub mod query;
