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
    statistics::functions::median,
};

const REQUIRED_FIELDS: [&str; 1] = [PSMS_FIELD];

/// Fragment ion coverage and mass error of the confident target PSMs
///
pub struct FragmentIonCollector {
    fdr_threshold: f64,
}

impl FragmentIonCollector {
    pub fn new(fdr_threshold: f64) -> Self {
        Self { fdr_threshold }
    }
}

impl MetricCollector for FragmentIonCollector {
    fn name(&self) -> &str {
        "FragmentIonCollector"
    }

    fn description(&self) -> &str {
        "Fragment ion coverage and mass error medians and arrays"
    }

    fn required_fields(&self) -> &[&'static str] {
        &REQUIRED_FIELDS
    }

    fn collect_data(
        &self,
        context: &AnalysisContext,
    ) -> Result<BTreeMap<String, MetricValue>, MetricError> {
        let confident_psms: Vec<_> = context
            .get_identifications(PSMS_FIELD)?
            .iter()
            .filter(|psm| psm.is_confident_target(self.fdr_threshold))
            .collect();

        let coverages: Vec<f64> = confident_psms
            .iter()
            .filter_map(|psm| psm.fragment_ion_coverage)
            .filter(|coverage| coverage.is_finite())
            .collect();
        let mass_errors: Vec<f64> = confident_psms
            .iter()
            .filter_map(|psm| psm.fragment_mass_error_ppm)
            .filter(|error| error.is_finite())
            .collect();

        if let Some(coverage) = coverages.iter().find(|coverage| !(0.0..=1.0).contains(*coverage)) {
            return Err(MetricError::InvalidValue(
                "fragment_ion_coverage".to_string(),
                coverage.to_string(),
            ));
        }

        Ok(BTreeMap::from([
            (
                "median_fragment_ion_coverage".to_string(),
                median(&coverages).into(),
            ),
            (
                "median_fragment_mass_error_ppm".to_string(),
                median(&mass_errors).into(),
            ),
            ("fragment_ion_coverages".to_string(), coverages.into()),
            ("fragment_mass_errors_ppm".to_string(), mass_errors.into()),
        ]))
    }
}
