// std imports
use std::collections::BTreeMap;

// local imports
use crate::{
    errors::metric_error::MetricError,
    metrics::{
        analysis_context::{
            AnalysisContext, Identification, DATABASE_SIZE_FIELD, PEPTIDES_FIELD, PSMS_FIELD,
            PROTEIN_GROUPS_FIELD,
        },
        metric_collector::MetricCollector,
        metrics_record::MetricValue,
    },
};

const REQUIRED_FIELDS: [&str; 4] = [
    DATABASE_SIZE_FIELD,
    PSMS_FIELD,
    PEPTIDES_FIELD,
    PROTEIN_GROUPS_FIELD,
];

/// Counts target and decoy PSMs, peptides and protein groups passing the FDR threshold
/// and reports the database size.
///
pub struct IdentificationCountCollector {
    fdr_threshold: f64,
}

impl IdentificationCountCollector {
    /// Creates a new collector
    ///
    /// # Arguments
    /// * `fdr_threshold` - Maximum q-value of a counted identification
    ///
    pub fn new(fdr_threshold: f64) -> Self {
        Self { fdr_threshold }
    }

    /// Returns the number of confident targets and decoys
    fn count(&self, identifications: &[Identification]) -> (f64, f64) {
        identifications
            .iter()
            .fold((0.0, 0.0), |(targets, decoys), identification| {
                if identification.is_confident_target(self.fdr_threshold) {
                    (targets + 1.0, decoys)
                } else if identification.is_confident_decoy(self.fdr_threshold) {
                    (targets, decoys + 1.0)
                } else {
                    (targets, decoys)
                }
            })
    }
}

impl MetricCollector for IdentificationCountCollector {
    fn name(&self) -> &str {
        "IdentificationCountCollector"
    }

    fn description(&self) -> &str {
        "Target/decoy PSM, peptide and protein group counts at the FDR threshold"
    }

    fn required_fields(&self) -> &[&'static str] {
        &REQUIRED_FIELDS
    }

    fn collect_data(
        &self,
        context: &AnalysisContext,
    ) -> Result<BTreeMap<String, MetricValue>, MetricError> {
        let database_size = context.get_scalar(DATABASE_SIZE_FIELD)?;
        if !database_size.is_finite() || database_size < 0.0 {
            return Err(MetricError::InvalidValue(
                DATABASE_SIZE_FIELD.to_string(),
                database_size.to_string(),
            ));
        }

        let (target_psms, decoy_psms) = self.count(context.get_identifications(PSMS_FIELD)?);
        let (target_peptides, decoy_peptides) =
            self.count(context.get_identifications(PEPTIDES_FIELD)?);
        let (target_protein_groups, decoy_protein_groups) =
            self.count(context.get_identifications(PROTEIN_GROUPS_FIELD)?);

        Ok(BTreeMap::from([
            ("database_size".to_string(), database_size.into()),
            ("fdr_threshold".to_string(), self.fdr_threshold.into()),
            ("target_psm_count".to_string(), target_psms.into()),
            ("decoy_psm_count".to_string(), decoy_psms.into()),
            ("target_peptide_count".to_string(), target_peptides.into()),
            ("decoy_peptide_count".to_string(), decoy_peptides.into()),
            (
                "target_protein_group_count".to_string(),
                target_protein_groups.into(),
            ),
            (
                "decoy_protein_group_count".to_string(),
                decoy_protein_groups.into(),
            ),
        ]))
    }
}
