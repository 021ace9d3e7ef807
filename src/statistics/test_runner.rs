// std imports
use std::sync::atomic::{AtomicBool, Ordering};

// 3rd party imports
use tracing::{debug, info, warn};

// local imports
use crate::{
    constants::{COMBINED_METRIC_NAME, COMBINED_TEST_NAME},
    errors::statistical_test_error::StatisticalTestError,
    metrics::metrics_record::MetricsRecord,
};

use super::{
    multiple_testing::CorrectionMethod,
    p_value_combination::CombinationMethod,
    statistical_result::{StatisticalResult, StatisticalResults, TestSummary},
    statistical_test::StatisticalTest,
};

/// Default significance level
///
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Runs the registered tests over all records, corrects the p-values per test
/// and optionally combines the p-values of each database.
///
pub struct StatisticalTestRunner {
    tests: Vec<Box<dyn StatisticalTest>>,
    correction: CorrectionMethod,
    combination: Option<CombinationMethod>,
    alpha: f64,
}

impl StatisticalTestRunner {
    /// Creates a runner with Benjamini-Hochberg correction and Fisher combination
    ///
    /// # Arguments
    /// * `tests` - Tests, executed in the given order
    ///
    pub fn new(tests: Vec<Box<dyn StatisticalTest>>) -> Self {
        Self {
            tests,
            correction: CorrectionMethod::default(),
            combination: Some(CombinationMethod::default()),
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn with_correction(mut self, correction: CorrectionMethod) -> Self {
        self.correction = correction;
        self
    }

    /// Sets the method to combine the p-values per database, None disables the combined pseudo-test
    ///
    pub fn with_combination(mut self, combination: Option<CombinationMethod>) -> Self {
        self.combination = combination;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Number of registered tests
    ///
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn tests(&self) -> &[Box<dyn StatisticalTest>] {
        &self.tests
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Runs all tests. Tests which cannot run are reported with NaN p-values.
    /// Nothing is returned if the run was cancelled.
    ///
    /// # Arguments
    /// * `records` - All metrics records, tests may attach derived metrics
    /// * `stop_flag` - Cooperative cancellation flag
    ///
    pub fn run(
        &self,
        records: &mut [MetricsRecord],
        stop_flag: &AtomicBool,
    ) -> Result<StatisticalResults, StatisticalTestError> {
        let database_names: Vec<String> = records
            .iter()
            .map(|record| record.database_name().to_string())
            .collect();

        let mut results = Vec::with_capacity(database_names.len() * (self.tests.len() + 1));
        let mut summaries = Vec::with_capacity(self.tests.len() + 1);
        // p-value columns, one per test, in record order
        let mut p_value_columns: Vec<Vec<f64>> = Vec::with_capacity(self.tests.len());

        for test in self.tests.iter() {
            if stop_flag.load(Ordering::Relaxed) {
                return Err(StatisticalTestError::Cancelled);
            }
            let p_values = if test.can_run(records) {
                debug!("Running {}", test.test_name());
                let p_values = test.compute_p_values(records, stop_flag)?;
                database_names
                    .iter()
                    .map(|name| p_values.get(name).copied().unwrap_or(f64::NAN))
                    .collect()
            } else {
                warn!(
                    "{} cannot run on {} databases, skipping",
                    test.test_name(),
                    records.len()
                );
                vec![f64::NAN; database_names.len()]
            };

            let evaluated = self.push_column(
                &mut results,
                &database_names,
                test.test_name(),
                test.metric_name(),
                &p_values,
            );
            info!(
                "{}: {} of {} databases evaluated",
                test.test_name(),
                evaluated,
                database_names.len()
            );
            summaries.push(TestSummary {
                test_name: test.test_name().to_string(),
                description: test.description().to_string(),
                metric_name: test.metric_name().to_string(),
                databases_evaluated: evaluated,
            });
            p_value_columns.push(p_values);
        }

        if let Some(combination) = self.combination {
            let combined: Vec<f64> = (0..database_names.len())
                .map(|db_idx| {
                    let p_values: Vec<f64> =
                        p_value_columns.iter().map(|column| column[db_idx]).collect();
                    combination.combine(&p_values)
                })
                .collect();
            let evaluated = self.push_column(
                &mut results,
                &database_names,
                COMBINED_TEST_NAME,
                COMBINED_METRIC_NAME,
                &combined,
            );
            summaries.push(TestSummary {
                test_name: COMBINED_TEST_NAME.to_string(),
                description: format!("{:?} combination of all test p-values", combination),
                metric_name: COMBINED_METRIC_NAME.to_string(),
                databases_evaluated: evaluated,
            });
        }

        if stop_flag.load(Ordering::Relaxed) {
            return Err(StatisticalTestError::Cancelled);
        }
        Ok(StatisticalResults::new(results, summaries, self.alpha))
    }

    /// Corrects one p-value column and appends it to the results.
    /// Returns the number of databases with a p-value.
    ///
    fn push_column(
        &self,
        results: &mut Vec<StatisticalResult>,
        database_names: &[String],
        test_name: &str,
        metric_name: &str,
        p_values: &[f64],
    ) -> usize {
        let q_values = self.correction.adjust(p_values);
        results.extend(
            database_names
                .iter()
                .zip(p_values.iter().zip(q_values))
                .map(|(database_name, (p_value, q_value))| StatisticalResult {
                    database_name: database_name.clone(),
                    test_name: test_name.to_string(),
                    metric_name: metric_name.to_string(),
                    p_value: *p_value,
                    q_value,
                }),
        );
        p_values.iter().filter(|p| !p.is_nan()).count()
    }
}
