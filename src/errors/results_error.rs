use thiserror::Error;

use super::{
    cache_error::CacheError, metric_error::MetricError,
    statistical_test_error::StatisticalTestError,
};

/// Merges all errors which can occur while processing databases and finalizing
/// the statistical analysis
///
#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Cache error: {0}")]
    CacheError(#[from] CacheError),
    #[error("Metric error: {0}")]
    MetricError(#[from] MetricError),
    #[error("Statistical test error: {0}")]
    StatisticalTestError(#[from] StatisticalTestError),
    #[error("Statistical analysis was already finalized")]
    AlreadyFinalized,
}
