// std imports
use std::collections::BTreeMap;

// 3rd party imports
use tracing::{debug, error, warn};

// local imports
use crate::errors::metric_error::MetricError;

use super::{
    analysis_context::AnalysisContext,
    collectors::{
        fragment_ion_collector::FragmentIonCollector,
        identification_count_collector::IdentificationCountCollector,
        organism_specificity_collector::OrganismSpecificityCollector,
        retention_time_collector::RetentionTimeCollector,
    },
    metric_collector::MetricCollector,
    metrics_record::MetricsRecord,
};

/// Runs all registered collectors for one database and merges their output into one record.
/// A failing collector is recorded in the record's error list and does not affect the others.
///
pub struct MetricAggregator {
    collectors: Vec<Box<dyn MetricCollector>>,
}

impl MetricAggregator {
    /// Creates an aggregator with the given collectors
    ///
    /// # Arguments
    /// * `collectors` - Collectors, called in the given order
    ///
    pub fn new(collectors: Vec<Box<dyn MetricCollector>>) -> Self {
        Self { collectors }
    }

    /// Creates an aggregator with all built-in collectors
    ///
    /// # Arguments
    /// * `fdr_threshold` - Maximum q-value of counted identifications
    ///
    pub fn with_default_collectors(fdr_threshold: f64) -> Self {
        Self::new(vec![
            Box::new(IdentificationCountCollector::new(fdr_threshold)),
            Box::new(OrganismSpecificityCollector::new(fdr_threshold)),
            Box::new(FragmentIonCollector::new(fdr_threshold)),
            Box::new(RetentionTimeCollector::new(fdr_threshold)),
        ])
    }

    /// Returns the registered collectors
    ///
    pub fn collectors(&self) -> &[Box<dyn MetricCollector>] {
        &self.collectors
    }

    /// Computes the metrics record for one database.
    /// Fails only if no collector produced any metric.
    ///
    /// # Arguments
    /// * `context` - Analysis context of the database
    ///
    pub fn run_analysis(&self, context: &AnalysisContext) -> Result<MetricsRecord, MetricError> {
        let database_name = context.database_name();
        let mut metrics = BTreeMap::new();
        let mut errors = Vec::new();
        let mut successful_collectors: usize = 0;

        for collector in self.collectors.iter() {
            if !collector.can_collect_data(context) {
                warn!(
                    "[{}] Skipping {}, missing context fields: {}",
                    database_name,
                    collector.name(),
                    collector.missing_fields(context).join(", ")
                );
                continue;
            }
            match collector.collect_data(context) {
                Ok(collected) => {
                    debug!(
                        "[{}] {} collected {} metrics",
                        database_name,
                        collector.name(),
                        collected.len()
                    );
                    metrics.extend(collected);
                    successful_collectors += 1;
                }
                Err(err) => {
                    error!("[{}] {} failed: {}", database_name, collector.name(), err);
                    errors.push(format!("{}: {}", collector.name(), err));
                }
            }
        }

        if successful_collectors == 0 {
            let reason = if errors.is_empty() {
                "no collector could work on the context".to_string()
            } else {
                errors.join("\n\t")
            };
            return Err(MetricError::NoMetricsCollected(
                database_name.to_string(),
                reason,
            ));
        }

        let mut record = MetricsRecord::from_metrics(database_name.to_string(), metrics);
        record.set_errors(errors);
        Ok(record)
    }
}
