// std imports
use std::collections::BTreeMap;

// 3rd party imports
use paste::paste;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Value of a metric, either a single number or an array of numbers.
/// Missing values are NaN or an empty array.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Array(Vec<f64>),
}

impl MetricValue {
    /// Returns true if the value is the missing sentinel
    ///
    pub fn is_missing(&self) -> bool {
        match self {
            MetricValue::Scalar(value) => value.is_nan(),
            MetricValue::Array(values) => values.is_empty(),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Scalar(value)
    }
}

impl From<Vec<f64>> for MetricValue {
    fn from(values: Vec<f64>) -> Self {
        MetricValue::Array(values)
    }
}

/// Defines the metrics record with its well-known scalar and array fields,
/// the schema name lists and the translation between the open metric map and the fields.
/// Adding a metric only requires adding it to the macro invocation below.
///
macro_rules! metrics_schema {
    (
        scalars { $( $(#[$scalar_doc:meta])* $scalar:ident ),+ $(,)? }
        arrays { $( $(#[$array_doc:meta])* $array:ident ),+ $(,)? }
    ) => {
        paste! {
            /// Metrics of one transient database.
            ///
            #[derive(Debug, Clone)]
            pub struct MetricsRecord {
                /// Name of the transient database, unique and non-empty
                database_name: String,
                $(
                    $(#[$scalar_doc])*
                    $scalar: f64,
                )+
                $(
                    $(#[$array_doc])*
                    $array: Vec<f64>,
                )+
                /// Metrics which are not part of the well-known fields, including values derived by statistical tests
                additional_metrics: BTreeMap<String, MetricValue>,
                /// Errors of collectors which failed
                errors: Vec<String>,
            }

            /// Names of the well-known scalar metrics in column order
            ///
            pub const SCALAR_METRIC_NAMES: &[&str] = &[$( stringify!($scalar) ),+];

            /// Names of the well-known array metrics in column order
            ///
            pub const ARRAY_METRIC_NAMES: &[&str] = &[$( stringify!($array) ),+];

            impl MetricsRecord {
                /// Creates a new record with all metrics missing
                ///
                /// # Arguments
                /// * `database_name` - Name of the transient database
                ///
                pub fn new(database_name: String) -> Self {
                    Self {
                        database_name,
                        $( $scalar: f64::NAN, )+
                        $( $array: Vec::new(), )+
                        additional_metrics: BTreeMap::new(),
                        errors: Vec::new(),
                    }
                }

                $(
                    $(#[$scalar_doc])*
                    pub fn $scalar(&self) -> f64 {
                        self.$scalar
                    }

                    pub fn [<set_ $scalar>](&mut self, value: f64) {
                        self.$scalar = value;
                    }
                )+

                $(
                    $(#[$array_doc])*
                    pub fn $array(&self) -> &[f64] {
                        self.$array.as_slice()
                    }

                    pub fn [<set_ $array>](&mut self, values: Vec<f64>) {
                        self.$array = values;
                    }
                )+

                /// Returns the scalar metric with the given name, NaN if unknown or not a scalar
                ///
                /// # Arguments
                /// * `name` - Metric name
                ///
                pub fn get_scalar(&self, name: &str) -> f64 {
                    match name {
                        $( stringify!($scalar) => self.$scalar, )+
                        _ => match self.additional_metrics.get(name) {
                            Some(MetricValue::Scalar(value)) => *value,
                            _ => f64::NAN,
                        },
                    }
                }

                /// Returns the array metric with the given name, empty if unknown or not an array
                ///
                /// # Arguments
                /// * `name` - Metric name
                ///
                pub fn get_array(&self, name: &str) -> &[f64] {
                    match name {
                        $( stringify!($array) => self.$array.as_slice(), )+
                        _ => match self.additional_metrics.get(name) {
                            Some(MetricValue::Array(values)) => values.as_slice(),
                            _ => &[],
                        },
                    }
                }

                /// Sets a metric. Well-known names are written to their field,
                /// everything else goes into the additional metrics.
                ///
                /// # Arguments
                /// * `name` - Metric name
                /// * `value` - Metric value
                ///
                pub fn set_metric(&mut self, name: &str, value: MetricValue) {
                    match (name, value) {
                        $( (stringify!($scalar), MetricValue::Scalar(value)) => self.$scalar = value, )+
                        $( (stringify!($array), MetricValue::Array(values)) => self.$array = values, )+
                        $(
                            (stringify!($scalar), MetricValue::Array(_)) => warn!(
                                "[{}] Ignoring array value for scalar metric `{}`",
                                self.database_name, name
                            ),
                        )+
                        $(
                            (stringify!($array), MetricValue::Scalar(_)) => warn!(
                                "[{}] Ignoring scalar value for array metric `{}`",
                                self.database_name, name
                            ),
                        )+
                        (_, value) => {
                            self.additional_metrics.insert(name.to_string(), value);
                        }
                    }
                }

                /// Translates the typed fields and additional metrics into one open metric map
                ///
                pub fn to_metrics(&self) -> BTreeMap<String, MetricValue> {
                    let mut metrics = self.additional_metrics.clone();
                    $( metrics.insert(stringify!($scalar).to_string(), MetricValue::Scalar(self.$scalar)); )+
                    $( metrics.insert(stringify!($array).to_string(), MetricValue::Array(self.$array.clone())); )+
                    metrics
                }
            }
        }
    };
}

metrics_schema! {
    scalars {
        /// Number of proteins in the transient database
        database_size,
        /// FDR threshold the counts were taken at
        fdr_threshold,
        /// Target PSMs at the FDR threshold
        target_psm_count,
        /// Decoy PSMs at the FDR threshold
        decoy_psm_count,
        /// Target peptides at the FDR threshold
        target_peptide_count,
        /// Decoy peptides at the FDR threshold
        decoy_peptide_count,
        /// Target protein groups at the FDR threshold
        target_protein_group_count,
        /// Decoy protein groups at the FDR threshold
        decoy_protein_group_count,
        /// Target PSMs specific for the transient database
        unambiguous_psm_count,
        /// Target PSMs shared with the reference proteome
        ambiguous_psm_count,
        /// Target peptides specific for the transient database
        unambiguous_peptide_count,
        /// Target peptides shared with the reference proteome
        ambiguous_peptide_count,
        /// Median fragment ion coverage of the confident target PSMs
        median_fragment_ion_coverage,
        /// Median fragment mass error (ppm) of the confident target PSMs
        median_fragment_mass_error_ppm,
        retention_time_error_mean,
        retention_time_error_median,
        retention_time_error_std,
    }
    arrays {
        /// Scores of the unambiguous target PSMs
        unambiguous_psm_scores,
        /// Scores of the ambiguous target PSMs
        ambiguous_psm_scores,
        /// Scores of all decoy PSMs, used as background
        decoy_psm_scores,
        fragment_ion_coverages,
        fragment_mass_errors_ppm,
    }
}

impl MetricsRecord {
    /// Creates a record from an open metric map
    ///
    /// # Arguments
    /// * `database_name` - Name of the transient database
    /// * `metrics` - Metric map
    ///
    pub fn from_metrics(database_name: String, metrics: BTreeMap<String, MetricValue>) -> Self {
        let mut record = Self::new(database_name);
        record.apply_metrics(metrics);
        record
    }

    /// Merges the given metric map into the record
    ///
    pub fn apply_metrics(&mut self, metrics: BTreeMap<String, MetricValue>) {
        for (name, value) in metrics {
            self.set_metric(&name, value);
        }
    }

    /// Returns the database name
    ///
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Metrics not covered by the well-known fields
    ///
    pub fn additional_metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.additional_metrics
    }

    /// Errors of failed collectors
    ///
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn set_errors(&mut self, errors: Vec<String>) {
        self.errors = errors;
    }

    /// Returns a scalar metric which may be a well-known field or an additional metric
    /// and falls back to the length of an array metric with that name.
    ///
    /// # Arguments
    /// * `name` - Metric name
    ///
    pub fn get_scalar_or_len(&self, name: &str) -> f64 {
        let value = self.get_scalar(name);
        if !value.is_nan() {
            return value;
        }
        let values = self.get_array(name);
        if values.is_empty() {
            f64::NAN
        } else {
            values.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_missing() {
        let record = MetricsRecord::new("db".to_string());
        for name in SCALAR_METRIC_NAMES {
            assert!(record.get_scalar(name).is_nan());
        }
        for name in ARRAY_METRIC_NAMES {
            assert!(record.get_array(name).is_empty());
        }
        assert!(record.get_scalar("unknown").is_nan());
        assert!(record.get_array("unknown").is_empty());
    }

    #[test]
    fn test_map_to_fields_and_back() {
        let mut metrics = BTreeMap::new();
        metrics.insert("target_psm_count".to_string(), MetricValue::Scalar(12.0));
        metrics.insert(
            "decoy_psm_scores".to_string(),
            MetricValue::Array(vec![1.0, 2.0]),
        );
        metrics.insert("custom_metric".to_string(), MetricValue::Scalar(0.5));

        let record = MetricsRecord::from_metrics("db".to_string(), metrics);
        assert_eq!(record.target_psm_count(), 12.0);
        assert_eq!(record.decoy_psm_scores(), &[1.0, 2.0]);
        assert_eq!(record.get_scalar("custom_metric"), 0.5);
        assert_eq!(record.additional_metrics().len(), 1);

        let back = record.to_metrics();
        assert_eq!(back.get("target_psm_count"), Some(&MetricValue::Scalar(12.0)));
        assert_eq!(back.get("custom_metric"), Some(&MetricValue::Scalar(0.5)));
        assert_eq!(
            back.len(),
            SCALAR_METRIC_NAMES.len() + ARRAY_METRIC_NAMES.len() + 1
        );
    }

    #[test]
    fn test_mismatching_value_type_is_ignored() {
        let mut record = MetricsRecord::new("db".to_string());
        record.set_metric("target_psm_count", MetricValue::Array(vec![1.0]));
        assert!(record.target_psm_count().is_nan());
        assert!(record.additional_metrics().is_empty());
    }

    #[test]
    fn test_get_scalar_or_len() {
        let mut record = MetricsRecord::new("db".to_string());
        record.set_unambiguous_psm_scores(vec![1.0, 2.0, 3.0]);
        assert_eq!(record.get_scalar_or_len("unambiguous_psm_scores"), 3.0);
        record.set_target_psm_count(5.0);
        assert_eq!(record.get_scalar_or_len("target_psm_count"), 5.0);
    }
}
