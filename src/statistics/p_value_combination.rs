// 3rd party imports
use serde::{Deserialize, Serialize};

// local imports
use crate::constants::MIN_P_VALUE;

use super::functions::{chi_squared_sf, standard_normal_quantile, standard_normal_sf};

/// Method to combine the p-values of all tests of one database into one p-value.
/// NaN p-values are ignored, a database without any p-value gets NaN.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMethod {
    /// -2 * sum(ln p) ~ chi²(2k)
    #[default]
    Fisher,
    /// sum(z) / sqrt(k) ~ N(0, 1)
    Stouffer,
}

impl CombinationMethod {
    /// Combines the p-values
    ///
    /// # Arguments
    /// * `p_values` - P-values of one database
    ///
    pub fn combine(&self, p_values: &[f64]) -> f64 {
        let p_values: Vec<f64> = p_values
            .iter()
            .filter(|p| !p.is_nan())
            .map(|p| p.clamp(MIN_P_VALUE, 1.0))
            .collect();
        if p_values.is_empty() {
            return f64::NAN;
        }
        match self {
            CombinationMethod::Fisher => fisher(&p_values),
            CombinationMethod::Stouffer => stouffer(&p_values),
        }
    }
}

fn fisher(p_values: &[f64]) -> f64 {
    let statistic = -2.0 * p_values.iter().map(|p| p.ln()).sum::<f64>();
    chi_squared_sf(statistic, 2.0 * p_values.len() as f64).clamp(MIN_P_VALUE, 1.0)
}

fn stouffer(p_values: &[f64]) -> f64 {
    // z = Φ^-1(1 - p) = -Φ^-1(p), p = 1 would give an infinite z
    let z_sum: f64 = p_values
        .iter()
        .map(|p| -standard_normal_quantile(p.clamp(MIN_P_VALUE, 1.0 - f64::EPSILON)))
        .sum();
    standard_normal_sf(z_sum / (p_values.len() as f64).sqrt()).clamp(MIN_P_VALUE, 1.0)
}
