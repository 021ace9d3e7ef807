/// Per-database input supplied by the search and post-processing engine
pub mod analysis_context;
/// Built-in metric collectors
pub mod collectors;
/// Runs all collectors for one database
pub mod metric_aggregator;
/// Interface for metric collectors
pub mod metric_collector;
/// Metrics record with well-known fields and open metric map
pub mod metrics_record;
