/// Cached vs. pending databases
pub mod cache_summary;
/// Per-database processing and the final statistical analysis
pub mod results_manager;
