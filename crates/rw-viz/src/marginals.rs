//! Per-feature marginal comparison: data vs raw MC vs reweighted MC.

use rw_core::{Error, Result};
use rw_inference::diagnostics::{
    WeightedHistogram, chi2_against, normalise, quantile_range, separation_metric,
};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Histogram binning shared by all marginal plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Bins per feature.
    pub n_bins: usize,
    /// Lower quantile of the pooled sample used as range start.
    pub quantile_low: f64,
    /// Upper quantile of the pooled sample used as range end.
    pub quantile_high: f64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self { n_bins: 40, quantile_low: 0.001, quantile_high: 0.999 }
    }
}

impl BinningConfig {
    /// Reject empty binning or an inverted quantile range.
    pub fn validate(&self) -> Result<()> {
        if self.n_bins == 0 {
            return Err(Error::Validation("histograms.n_bins must be > 0".to_string()));
        }
        let ok = (0.0..=1.0).contains(&self.quantile_low)
            && (0.0..=1.0).contains(&self.quantile_high)
            && self.quantile_low < self.quantile_high;
        if !ok {
            return Err(Error::Validation(format!(
                "histogram quantiles must satisfy 0 <= low < high <= 1, got [{}, {}]",
                self.quantile_low, self.quantile_high
            )));
        }
        Ok(())
    }
}

/// One MC variant drawn against data.
#[derive(Debug, Clone, Serialize)]
pub struct MarginalSeries {
    pub name: String,
    /// Bin contents in data units.
    pub y: Vec<f64>,
    /// `sqrt(sum w^2)` per bin, in data units.
    pub yerr: Vec<f64>,
    pub chi2: f64,
    pub ndf: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chi2_pvalue: Option<f64>,
    /// Shape separation from data, in `[0, 1]`.
    pub separation: f64,
}

/// Marginal distribution of one feature.
#[derive(Debug, Clone, Serialize)]
pub struct MarginalArtifact {
    pub feature: String,
    pub bin_edges: Vec<f64>,
    pub data_y: Vec<f64>,
    pub data_yerr: Vec<f64>,
    /// Entries outside the plotted range: `[data, mc_raw, mc_reweighted]`.
    pub out_of_range: [f64; 3],
    pub mc_raw: MarginalSeries,
    pub mc_reweighted: MarginalSeries,
}

fn series(name: &str, data: &WeightedHistogram, mc: &WeightedHistogram, k: f64) -> Result<MarginalSeries> {
    let (y, yerr) = mc.scaled(k);
    let (chi2, ndf) = chi2_against(data, mc, k)?;
    let chi2_pvalue = if ndf > 0 {
        let dist = ChiSquared::new(ndf as f64)
            .map_err(|e| Error::Computation(format!("chi2 distribution: {}", e)))?;
        Some(dist.sf(chi2))
    } else {
        None
    };
    let separation = separation_metric(&normalise(data.sumw()), &normalise(mc.sumw()));
    Ok(MarginalSeries { name: name.to_string(), y, yerr, chi2, ndf, chi2_pvalue, separation })
}

fn column(rows: &[&[f64]], j: usize) -> Vec<f64> {
    rows.iter().map(|r| r[j]).collect()
}

/// Build marginal artifacts for every feature.
///
/// Raw MC is scaled to the data event count; reweighted MC is drawn with its
/// weights as given (they are already in data units).
pub fn marginal_artifacts(
    feature_names: &[String],
    data_rows: &[&[f64]],
    mc_rows: &[&[f64]],
    mc_weights: &[f64],
    binning: &BinningConfig,
) -> Result<Vec<MarginalArtifact>> {
    binning.validate()?;
    if data_rows.is_empty() || mc_rows.is_empty() {
        return Err(Error::Validation("marginals need data and MC events".to_string()));
    }
    if mc_rows.len() != mc_weights.len() {
        return Err(Error::Validation(format!(
            "MC rows/weights length mismatch: {} vs {}",
            mc_rows.len(),
            mc_weights.len()
        )));
    }
    let p = feature_names.len();
    if data_rows.iter().chain(mc_rows).any(|r| r.len() != p) {
        return Err(Error::Validation(format!("every event must have {} features", p)));
    }
    let raw_scale = data_rows.len() as f64 / mc_rows.len() as f64;

    let mut out = Vec::with_capacity(p);
    for (j, name) in feature_names.iter().enumerate() {
        let xd = column(data_rows, j);
        let xm = column(mc_rows, j);
        let pooled: Vec<f64> = xd.iter().chain(&xm).copied().collect();
        let (low, high) = quantile_range(&pooled, binning.quantile_low, binning.quantile_high)?;
        // Include the upper quantile itself in the last bin.
        let high = high + 1e-9 * (high - low);

        let h_data = WeightedHistogram::from_values(binning.n_bins, low, high, &xd, None)?;
        let h_raw = WeightedHistogram::from_values(binning.n_bins, low, high, &xm, None)?;
        let h_rw = WeightedHistogram::from_values(binning.n_bins, low, high, &xm, Some(mc_weights))?;

        let (data_y, data_yerr) = h_data.scaled(1.0);
        out.push(MarginalArtifact {
            feature: name.clone(),
            bin_edges: h_data.edges(),
            data_y,
            data_yerr,
            out_of_range: [
                h_data.underflow() + h_data.overflow(),
                raw_scale * (h_raw.underflow() + h_raw.overflow()),
                h_rw.underflow() + h_rw.overflow(),
            ],
            mc_raw: series("mc_raw", &h_data, &h_raw, raw_scale)?,
            mc_reweighted: series("mc_reweighted", &h_data, &h_rw, 1.0)?,
        });
    }
    Ok(out)
}
