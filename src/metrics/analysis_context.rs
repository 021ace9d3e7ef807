// std imports
use std::collections::HashMap;

// 3rd party imports
use serde::{Deserialize, Serialize};

// local imports
use crate::errors::metric_error::MetricError;

/// Context field with the filtered peptide-spectrum matches
///
pub const PSMS_FIELD: &str = "psms";

/// Context field with the filtered peptides
///
pub const PEPTIDES_FIELD: &str = "peptides";

/// Context field with the filtered protein groups
///
pub const PROTEIN_GROUPS_FIELD: &str = "protein_groups";

/// Context field with the number of proteins in the transient database
///
pub const DATABASE_SIZE_FIELD: &str = "database_size";

/// One identification (PSM, peptide or protein group) as reported by the upstream
/// search and post-processing engine
///
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identification {
    /// Identifier, e.g. spectrum ID, peptide sequence or protein group accession
    pub id: String,
    /// Search engine score, higher is better
    pub score: f64,
    /// Q-value after target-decoy FDR estimation
    pub q_value: f64,
    /// True if the identification is a decoy
    pub is_decoy: bool,
    /// True if the evidence is shared with the reference proteome and
    /// therefore not specific for the transient database's organism
    #[serde(default)]
    pub is_ambiguous: bool,
    /// Fraction of matched fragment ions
    #[serde(default)]
    pub fragment_ion_coverage: Option<f64>,
    /// Median fragment mass error in ppm
    #[serde(default)]
    pub fragment_mass_error_ppm: Option<f64>,
    /// Observed retention time
    #[serde(default)]
    pub retention_time: Option<f64>,
    /// Predicted retention time
    #[serde(default)]
    pub predicted_retention_time: Option<f64>,
}

impl Identification {
    /// Returns true if the identification is a target passing the given FDR threshold
    ///
    /// # Arguments
    /// * `fdr_threshold` - Maximum q-value
    ///
    pub fn is_confident_target(&self, fdr_threshold: f64) -> bool {
        !self.is_decoy && self.q_value <= fdr_threshold
    }

    /// Returns true if the identification is a decoy passing the given FDR threshold
    ///
    /// # Arguments
    /// * `fdr_threshold` - Maximum q-value
    ///
    pub fn is_confident_decoy(&self, fdr_threshold: f64) -> bool {
        self.is_decoy && self.q_value <= fdr_threshold
    }

    /// Returns the retention time error (observed - predicted) if both are known
    ///
    pub fn retention_time_error(&self) -> Option<f64> {
        match (self.retention_time, self.predicted_retention_time) {
            (Some(observed), Some(predicted)) => Some(observed - predicted),
            _ => None,
        }
    }
}

/// Value of a context field
///
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Scalar(f64),
    Scores(Vec<f64>),
    Identifications(Vec<Identification>),
}

/// Read-only bag of already filtered identification collections, counts and
/// score arrays for one transient database.
/// Consumed only through named field access.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Name of the transient database
    database_name: String,
    /// Named fields
    fields: HashMap<String, ContextValue>,
}

impl AnalysisContext {
    /// Creates a new empty context
    ///
    /// # Arguments
    /// * `database_name` - Name of the transient database
    ///
    pub fn new(database_name: String) -> Self {
        Self {
            database_name,
            fields: HashMap::new(),
        }
    }

    /// Adds a field, replacing any previous value with the same name
    ///
    pub fn with_field(mut self, name: &str, value: ContextValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Returns the database name
    ///
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Checks if a field is present
    ///
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns a scalar field
    ///
    /// # Arguments
    /// * `name` - Field name
    ///
    pub fn get_scalar(&self, name: &str) -> Result<f64, MetricError> {
        match self.fields.get(name) {
            Some(ContextValue::Scalar(value)) => Ok(*value),
            Some(_) => Err(MetricError::ContextFieldTypeMismatch(
                name.to_string(),
                "scalar",
            )),
            None => Err(MetricError::MissingContextField(name.to_string())),
        }
    }

    /// Returns a score array field
    ///
    /// # Arguments
    /// * `name` - Field name
    ///
    pub fn get_scores(&self, name: &str) -> Result<&[f64], MetricError> {
        match self.fields.get(name) {
            Some(ContextValue::Scores(scores)) => Ok(scores),
            Some(_) => Err(MetricError::ContextFieldTypeMismatch(
                name.to_string(),
                "score array",
            )),
            None => Err(MetricError::MissingContextField(name.to_string())),
        }
    }

    /// Returns an identification collection
    ///
    /// # Arguments
    /// * `name` - Field name
    ///
    pub fn get_identifications(&self, name: &str) -> Result<&[Identification], MetricError> {
        match self.fields.get(name) {
            Some(ContextValue::Identifications(identifications)) => Ok(identifications),
            // An empty JSON array deserializes into the first matching untagged variant
            Some(ContextValue::Scores(scores)) if scores.is_empty() => Ok(&[]),
            Some(_) => Err(MetricError::ContextFieldTypeMismatch(
                name.to_string(),
                "identification collection",
            )),
            None => Err(MetricError::MissingContextField(name.to_string())),
        }
    }
}
