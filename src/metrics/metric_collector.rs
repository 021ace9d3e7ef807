// std imports
use std::collections::BTreeMap;

// local imports
use crate::errors::metric_error::MetricError;

use super::{analysis_context::AnalysisContext, metrics_record::MetricValue};

/// Pluggable unit computing named metrics from one database's analysis context
///
pub trait MetricCollector: Send + Sync {
    /// Name of the collector, used in logs and error messages
    ///
    fn name(&self) -> &str;

    /// Short description of the collected metrics
    ///
    fn description(&self) -> &str;

    /// Context fields which must be present to collect data
    ///
    fn required_fields(&self) -> &[&'static str];

    /// Returns the required fields missing in the given context
    ///
    /// # Arguments
    /// * `context` - Analysis context of one database
    ///
    fn missing_fields(&self, context: &AnalysisContext) -> Vec<&'static str> {
        self.required_fields()
            .iter()
            .filter(|field| !context.has_field(field))
            .copied()
            .collect()
    }

    /// Checks if the collector can work on the given context
    ///
    /// # Arguments
    /// * `context` - Analysis context of one database
    ///
    fn can_collect_data(&self, context: &AnalysisContext) -> bool {
        self.missing_fields(context).is_empty()
    }

    /// Collects the metrics
    ///
    /// # Arguments
    /// * `context` - Analysis context of one database
    ///
    fn collect_data(
        &self,
        context: &AnalysisContext,
    ) -> Result<BTreeMap<String, MetricValue>, MetricError>;
}
