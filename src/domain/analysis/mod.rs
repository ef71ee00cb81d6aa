//! Analysis Module - turns query data into renderable candidates.
//!
//! # Components
//!
//! - `FieldAccessor` - path into a datapoint with memoized per-series statistics
//! - `AccessorRegistry` - named statistic table and accessor factory
//! - `Analyzer` - async fold stage producing candidate visualizations
//! - `Preprocessor` - per-visualization render transform
//! - `DataTableAnalyzer` / `DataTablePreprocessor` - built-in tabular view
//!
//! Statistic caches are keyed by series identity and never own the series,
//! so they are safe to share across queries.

mod accessor;
mod analyzer;
mod candidate;
pub mod datatable;
mod preprocessor;
mod registry;
mod stat_value;
pub mod stats;
pub mod transform;

pub use accessor::{FieldAccessor, StatFn};
pub use analyzer::{analyzer_fn, Analyzer, FnAnalyzer};
pub use candidate::{AnalysisResults, Candidate, OutputEntry, QueryOutput};
pub use datatable::{
    Column, DataTableAnalyzer, DataTablePreprocessor, TableConfig, DEFAULT_MAX_POINTS,
    DEFAULT_MAX_SERIES,
};
pub use preprocessor::{preprocessor_fn, DefaultPreprocessor, FnPreprocessor, Preprocessor};
pub use registry::AccessorRegistry;
pub use stat_value::StatValue;
