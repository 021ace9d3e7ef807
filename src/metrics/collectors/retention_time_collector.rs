// std imports
use std::collections::BTreeMap;

// local imports
use crate::{
    errors::metric_error::MetricError,
    metrics::{
        analysis_context::{AnalysisContext, PSMS_FIELD},
        metric_collector::MetricCollector,
        metrics_record::MetricValue,
    },
    statistics::functions::{mean, median, sample_std},
};

const REQUIRED_FIELDS: [&str; 1] = [PSMS_FIELD];

/// Summarizes the error between observed and predicted retention time of the confident target PSMs
///
pub struct RetentionTimeCollector {
    fdr_threshold: f64,
}

impl RetentionTimeCollector {
    pub fn new(fdr_threshold: f64) -> Self {
        Self { fdr_threshold }
    }
}

impl MetricCollector for RetentionTimeCollector {
    fn name(&self) -> &str {
        "RetentionTimeCollector"
    }

    fn description(&self) -> &str {
        "Mean, median and standard deviation of the retention time error"
    }

    fn required_fields(&self) -> &[&'static str] {
        &REQUIRED_FIELDS
    }

    fn collect_data(
        &self,
        context: &AnalysisContext,
    ) -> Result<BTreeMap<String, MetricValue>, MetricError> {
        let errors: Vec<f64> = context
            .get_identifications(PSMS_FIELD)?
            .iter()
            .filter(|psm| psm.is_confident_target(self.fdr_threshold))
            .filter_map(|psm| psm.retention_time_error())
            .filter(|error| error.is_finite())
            .collect();

        Ok(BTreeMap::from([
            ("retention_time_error_mean".to_string(), mean(&errors).into()),
            (
                "retention_time_error_median".to_string(),
                median(&errors).into(),
            ),
            (
                "retention_time_error_std".to_string(),
                sample_std(&errors).into(),
            ),
        ]))
    }
}
