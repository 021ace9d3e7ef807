// std imports
use std::collections::BTreeMap;

// local imports
use crate::{
    errors::metric_error::MetricError,
    metrics::{
        analysis_context::{AnalysisContext, PEPTIDES_FIELD, PSMS_FIELD},
        metric_collector::MetricCollector,
        metrics_record::MetricValue,
    },
};

const REQUIRED_FIELDS: [&str; 2] = [PSMS_FIELD, PEPTIDES_FIELD];

/// Splits confident target identifications into evidence specific for the
/// transient database (unambiguous) and evidence shared with the reference
/// proteome (ambiguous). Also provides the decoy scores as background sample.
///
pub struct OrganismSpecificityCollector {
    fdr_threshold: f64,
}

impl OrganismSpecificityCollector {
    pub fn new(fdr_threshold: f64) -> Self {
        Self { fdr_threshold }
    }
}

impl MetricCollector for OrganismSpecificityCollector {
    fn name(&self) -> &str {
        "OrganismSpecificityCollector"
    }

    fn description(&self) -> &str {
        "Unambiguous vs. ambiguous evidence counts and score arrays"
    }

    fn required_fields(&self) -> &[&'static str] {
        &REQUIRED_FIELDS
    }

    fn collect_data(
        &self,
        context: &AnalysisContext,
    ) -> Result<BTreeMap<String, MetricValue>, MetricError> {
        let psms = context.get_identifications(PSMS_FIELD)?;
        let peptides = context.get_identifications(PEPTIDES_FIELD)?;

        let mut unambiguous_psm_scores = Vec::new();
        let mut ambiguous_psm_scores = Vec::new();
        let mut decoy_psm_scores = Vec::new();

        for psm in psms {
            if psm.is_decoy {
                // all decoys, the background must not depend on the FDR cut
                decoy_psm_scores.push(psm.score);
            } else if psm.q_value <= self.fdr_threshold {
                if psm.is_ambiguous {
                    ambiguous_psm_scores.push(psm.score);
                } else {
                    unambiguous_psm_scores.push(psm.score);
                }
            }
        }

        let (unambiguous_peptides, ambiguous_peptides) = peptides
            .iter()
            .filter(|peptide| peptide.is_confident_target(self.fdr_threshold))
            .fold((0.0, 0.0), |(unambiguous, ambiguous), peptide| {
                if peptide.is_ambiguous {
                    (unambiguous, ambiguous + 1.0)
                } else {
                    (unambiguous + 1.0, ambiguous)
                }
            });

        Ok(BTreeMap::from([
            (
                "unambiguous_psm_count".to_string(),
                (unambiguous_psm_scores.len() as f64).into(),
            ),
            (
                "ambiguous_psm_count".to_string(),
                (ambiguous_psm_scores.len() as f64).into(),
            ),
            (
                "unambiguous_peptide_count".to_string(),
                unambiguous_peptides.into(),
            ),
            (
                "ambiguous_peptide_count".to_string(),
                ambiguous_peptides.into(),
            ),
            (
                "unambiguous_psm_scores".to_string(),
                unambiguous_psm_scores.into(),
            ),
            ("ambiguous_psm_scores".to_string(), ambiguous_psm_scores.into()),
            ("decoy_psm_scores".to_string(), decoy_psm_scores.into()),
        ]))
    }
}
