//! Timeseries Query - reactive time-series query engine
//!
//! Routes server-pushed events to subscribers, keeps one dataset query per
//! consumer alive with single-flight fetching, and runs the results through
//! a pluggable analysis pipeline.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
