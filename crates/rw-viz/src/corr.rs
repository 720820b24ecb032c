//! Correlation matrices before and after reweighting (numbers-first).

use rw_core::Result;
use rw_inference::diagnostics::{max_abs_difference, weighted_correlation};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationArtifact {
    pub feature_names: Vec<String>,
    pub data: Vec<Vec<f64>>,
    pub mc_raw: Vec<Vec<f64>>,
    /// `None` when no MC event carries a positive finite weight.
    pub mc_reweighted: Option<Vec<Vec<f64>>>,
    /// `max |corr_mc_raw - corr_data|`.
    pub max_abs_diff_raw: f64,
    /// `max |corr_mc_reweighted - corr_data|`.
    pub max_abs_diff_reweighted: Option<f64>,
}

/// Weighted Pearson correlations of data, raw MC and reweighted MC.
pub fn correlation_artifact(
    feature_names: &[String],
    data_rows: &[&[f64]],
    mc_rows: &[&[f64]],
    mc_weights: &[f64],
) -> Result<CorrelationArtifact> {
    let data = weighted_correlation(data_rows, None)?;
    let mc_raw = weighted_correlation(mc_rows, None)?;
    let mc_reweighted = if mc_weights.iter().any(|w| w.is_finite() && *w > 0.0) {
        Some(weighted_correlation(mc_rows, Some(mc_weights))?)
    } else {
        None
    };
    Ok(CorrelationArtifact {
        feature_names: feature_names.to_vec(),
        max_abs_diff_raw: max_abs_difference(&data, &mc_raw),
        max_abs_diff_reweighted: mc_reweighted.as_deref().map(|c| max_abs_difference(&data, c)),
        data,
        mc_raw,
        mc_reweighted,
    })
}
