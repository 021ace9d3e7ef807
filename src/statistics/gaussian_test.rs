// std imports
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

// 3rd party imports
use tracing::debug;

// local imports
use crate::{errors::statistical_test_error::StatisticalTestError, metrics::metrics_record::MetricsRecord};

use super::{
    functions::{mean, sample_std, standard_normal_cdf, standard_normal_sf},
    statistical_test::{clamp_p_value, nan_p_values, StatisticalTest, TailDirection, TestDescriptor},
};

/// Minimal number of databases to fit the normal distribution
///
const MIN_DATABASES: usize = 2;

/// Fits one normal distribution over the values of all databases
/// and tests each database against it.
///
pub struct GaussianTest {
    descriptor: TestDescriptor,
    tail: TailDirection,
}

impl GaussianTest {
    /// Creates a new Gaussian test
    ///
    /// # Arguments
    /// * `descriptor` - Name, value extraction and skip rule
    /// * `tail` - Direction of the alternative
    ///
    pub fn new(descriptor: TestDescriptor, tail: TailDirection) -> Self {
        Self { descriptor, tail }
    }

    /// Fits mean and sample standard deviation.
    /// Returns None if there are less than two values or no variance.
    ///
    /// # Arguments
    /// * `values` - Values to fit
    ///
    pub fn fit(values: &[f64]) -> Option<(f64, f64)> {
        if values.len() < MIN_DATABASES {
            return None;
        }
        let mean = mean(values);
        let std = sample_std(values);
        if !mean.is_finite() || !std.is_finite() || std <= 0.0 {
            return None;
        }
        Some((mean, std))
    }
}

impl StatisticalTest for GaussianTest {
    fn test_name(&self) -> &str {
        self.descriptor.name()
    }

    fn description(&self) -> &str {
        self.descriptor.description()
    }

    fn metric_name(&self) -> &str {
        self.descriptor.metric_name()
    }

    fn get_test_value(&self, record: &MetricsRecord) -> f64 {
        self.descriptor.extract(record)
    }

    fn can_run(&self, records: &[MetricsRecord]) -> bool {
        self.descriptor.count_testable(records) >= MIN_DATABASES
    }

    fn compute_p_values(
        &self,
        records: &mut [MetricsRecord],
        stop_flag: &AtomicBool,
    ) -> Result<HashMap<String, f64>, StatisticalTestError> {
        if stop_flag.load(Ordering::Relaxed) {
            return Err(StatisticalTestError::Cancelled);
        }
        let values: Vec<f64> = records
            .iter()
            .filter_map(|record| self.descriptor.testable_value(record))
            .collect();

        let (mean, std) = match Self::fit(&values) {
            Some(fit) => fit,
            None => {
                debug!(
                    "{}: cannot fit normal distribution to {} values",
                    self.test_name(),
                    values.len()
                );
                return Ok(nan_p_values(records));
            }
        };
        debug!("{}: fitted N({}, {})", self.test_name(), mean, std);

        Ok(records
            .iter()
            .map(|record| {
                let p_value = match self.descriptor.testable_value(record) {
                    Some(value) => {
                        let z = (value - mean) / std;
                        clamp_p_value(
                            self.tail
                                .select(standard_normal_sf(z), standard_normal_cdf(z)),
                        )
                    }
                    None => f64::NAN,
                };
                (record.database_name().to_string(), p_value)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::statistics::statistical_test::{SkipPredicate, ValueExtractor};

    fn records(values: &[f64]) -> Vec<MetricsRecord> {
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                let mut record = MetricsRecord::new(format!("db_{}", idx));
                record.set_unambiguous_psm_count(*value);
                record
            })
            .collect()
    }

    fn test(tail: TailDirection) -> GaussianTest {
        GaussianTest::new(
            TestDescriptor::new(
                "Gaussian",
                "Normal distribution over unambiguous PSMs",
                ValueExtractor::metric("unambiguous_psm_count"),
            ),
            tail,
        )
    }

    /// Draws from N(mean, std) using Box-Muller
    fn normal_sample(n: usize, mean: f64, std: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(42);
        (0..n)
            .map(|_| {
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen();
                mean + std * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
            })
            .collect()
    }

    #[test]
    fn test_fit_matches_sample_statistics() {
        let values = normal_sample(2000, 10.0, 2.0);
        let (fitted_mean, fitted_std) = GaussianTest::fit(&values).unwrap();
        assert!((fitted_mean - mean(&values)).abs() < 1e-12);
        assert!((fitted_std - sample_std(&values)).abs() < 1e-12);
        assert!((fitted_mean - 10.0).abs() < 0.2);
        assert!((fitted_std - 2.0).abs() < 0.2);
    }

    #[test]
    fn test_value_at_mean_gives_half() {
        let mut values = normal_sample(200, 10.0, 2.0);
        values.push(mean(&values));
        let mut records = records(&values);
        let p_values = test(TailDirection::Upper)
            .compute_p_values(&mut records, &AtomicBool::new(false))
            .unwrap();
        let at_mean = p_values.get(&format!("db_{}", values.len() - 1)).unwrap();
        assert!((at_mean - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_directions() {
        let mut records = records(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        let stop_flag = AtomicBool::new(false);
        let upper = test(TailDirection::Upper)
            .compute_p_values(&mut records, &stop_flag)
            .unwrap();
        let lower = test(TailDirection::Lower)
            .compute_p_values(&mut records, &stop_flag)
            .unwrap();
        assert!(upper["db_4"] < upper["db_0"]);
        assert!(lower["db_4"] > lower["db_0"]);
        assert!((upper["db_4"] + lower["db_4"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_input() {
        let stop_flag = AtomicBool::new(false);
        let mut constant = records(&[5.0, 5.0, 5.0]);
        let p_values = test(TailDirection::Upper)
            .compute_p_values(&mut constant, &stop_flag)
            .unwrap();
        assert!(p_values.values().all(|p| p.is_nan()));

        let mut with_missing = records(&[1.0, f64::NAN, 3.0, 4.0]);
        let gaussian = test(TailDirection::Upper);
        assert!(gaussian.can_run(&with_missing));
        let p_values = gaussian.compute_p_values(&mut with_missing, &stop_flag).unwrap();
        assert!(p_values["db_1"].is_nan());
        assert!(p_values["db_0"].is_finite());

        assert!(!gaussian.can_run(&records(&[1.0])));
    }

    #[test]
    fn test_skipped_database_is_nan() {
        let mut records = records(&[1.0, 2.0, 3.0, 50.0]);
        records[3].set_target_psm_count(1.0);
        for record in records.iter_mut().take(3) {
            record.set_target_psm_count(100.0);
        }
        let gaussian = GaussianTest::new(
            TestDescriptor::new("G", "", ValueExtractor::metric("unambiguous_psm_count"))
                .with_skip_predicate(SkipPredicate::BelowThreshold {
                    metric: "target_psm_count".to_string(),
                    threshold: 10.0,
                }),
            TailDirection::Upper,
        );
        let p_values = gaussian
            .compute_p_values(&mut records, &AtomicBool::new(false))
            .unwrap();
        assert!(p_values["db_3"].is_nan());
        // fit only over 1, 2, 3
        assert!((p_values["db_1"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cancelled() {
        let mut records = records(&[1.0, 2.0]);
        assert!(matches!(
            test(TailDirection::Upper).compute_p_values(&mut records, &AtomicBool::new(true)),
            Err(StatisticalTestError::Cancelled)
        ));
    }
}
