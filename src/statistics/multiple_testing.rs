// 3rd party imports
use serde::{Deserialize, Serialize};

/// Multiple testing correction applied per test across all databases.
/// NaN p-values are excluded from ranking and from the number of tests and stay NaN.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    /// Benjamini-Hochberg step-up procedure controlling the FDR
    #[default]
    BenjaminiHochberg,
    /// Bonferroni correction controlling the FWER
    Bonferroni,
    /// Q-values equal the p-values
    #[serde(rename = "none")]
    Uncorrected,
}

impl CorrectionMethod {
    /// Returns the corrected values in the order of the given p-values
    ///
    /// # Arguments
    /// * `p_values` - Raw p-values, NaN for skipped databases
    ///
    pub fn adjust(&self, p_values: &[f64]) -> Vec<f64> {
        match self {
            CorrectionMethod::BenjaminiHochberg => benjamini_hochberg(p_values),
            CorrectionMethod::Bonferroni => bonferroni(p_values),
            CorrectionMethod::Uncorrected => p_values.to_vec(),
        }
    }
}

/// Benjamini-Hochberg step-up procedure.
/// q_(i) = min_{j >= i} (m / j * p_(j)), capped at 1, where m is the number of non-NaN p-values.
///
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let mut q_values = vec![f64::NAN; p_values.len()];
    let mut ranked: Vec<usize> = (0..p_values.len())
        .filter(|idx| !p_values[*idx].is_nan())
        .collect();
    ranked.sort_by(|a, b| p_values[*a].total_cmp(&p_values[*b]));

    let tests = ranked.len() as f64;
    let mut running_min: f64 = 1.0;
    for (rank, idx) in ranked.iter().enumerate().rev() {
        let q_value = p_values[*idx] * tests / (rank + 1) as f64;
        running_min = running_min.min(q_value);
        q_values[*idx] = running_min;
    }
    q_values
}

/// Bonferroni correction, p * m capped at 1, where m is the number of non-NaN p-values
///
pub fn bonferroni(p_values: &[f64]) -> Vec<f64> {
    let tests = p_values.iter().filter(|p| !p.is_nan()).count() as f64;
    p_values
        .iter()
        .map(|p| if p.is_nan() { f64::NAN } else { (p * tests).min(1.0) })
        .collect()
}
