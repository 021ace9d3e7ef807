// Include readme in doc
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Readme.md"))]

/// Durable cache of per-database metrics
pub mod cache;
/// Constants shared across the crate
pub mod constants;
/// Error types
pub mod errors;
/// Metric collection for one transient database
pub mod metrics;
/// Configuration, search seam and worker pool of a screening run
pub mod orchestration;
/// Per-database processing and the final statistical analysis
pub mod results;
/// Statistical tests ranking the databases
pub mod statistics;
/// Terminal progress
pub mod ui;
