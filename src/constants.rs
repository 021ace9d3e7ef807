/// Column delimiter of the cache file
///
pub const CACHE_SEPARATOR: u8 = b'\t';

/// Delimiter for array values within a single cache column
///
pub const CACHE_ARRAY_SEPARATOR: char = ';';

/// Delimiter between entries of the additional metrics column
///
pub const CACHE_ADDITIONAL_METRICS_SEPARATOR: char = '|';

/// Column name for the database name within the cache file
///
pub const CACHE_DATABASE_NAME_COLUMN: &str = "database_name";

/// Column name for metrics which are not part of the well-known schema
///
pub const CACHE_ADDITIONAL_METRICS_COLUMN: &str = "additional_metrics";

/// Column name for the collector errors
///
pub const CACHE_ERRORS_COLUMN: &str = "errors";

/// Column delimiter of the statistical result files
///
pub const RESULTS_SEPARATOR: u8 = b'\t';

/// Name of the pseudo-test which combines the p-values of all tests per database
///
pub const COMBINED_TEST_NAME: &str = "Combined";

/// Metric name reported for the combined pseudo-test
///
pub const COMBINED_METRIC_NAME: &str = "all_tests";

/// Prefix for metrics derived by statistical tests and attached to the record
///
pub const DERIVED_KS_STATISTIC_PREFIX: &str = "ks_statistic_";

/// Lower bound of a reported parametric p-value
///
pub const MIN_P_VALUE: f64 = 1e-300;

/// Default cache file name
///
pub const DEFAULT_CACHE_FILE_NAME: &str = "database_metrics.tsv";

/// Default file name for the long-format statistical results
///
pub const DEFAULT_RESULTS_FILE_NAME: &str = "statistical_results.tsv";

/// Default file name for the test summary
///
pub const DEFAULT_SUMMARY_FILE_NAME: &str = "statistical_tests.tsv";

/// Default file name for the final dump of all records including derived metrics
///
pub const DEFAULT_FINAL_CACHE_FILE_NAME: &str = "database_metrics.final.tsv";

/// Prefix for the metrics counters
///
pub const COUNTER_PREFIX: &str = "transient_screen";
