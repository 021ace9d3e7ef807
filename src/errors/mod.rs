/// Errors related to the result cache
pub mod cache_error;
/// Errors related to the configuration
pub mod configuration_error;
/// Errors of metric collectors and the aggregation
pub mod metric_error;
/// Merges the errors of the results manager
pub mod results_error;
/// Errors of the statistical tests and the test runner
pub mod statistical_test_error;
