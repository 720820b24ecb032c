//! Reweighting diagnostics.
//!
//! This module implements:
//! - Kish effective sample size `(sum w)^2 / sum(w^2)`
//! - Weighted histograms with per-bin `sum w^2` errors
//! - Shape comparisons (chi2/ndf, separation metric)
//! - Weighted Pearson correlation matrices
//! - Classifier quality (ROC AUC, weighted ROC AUC, binary cross-entropy)
//! - Quality gates summarising whether a reweighting is usable

use std::cmp::Ordering;
use std::fmt;

use rw_core::{Error, Label, Result};
use serde::Serialize;

/// Kish effective sample size `(sum w)^2 / sum(w^2)`.
///
/// Equals `n` for uniform weights and is strictly smaller otherwise.
pub fn effective_sample_size(weights: &[f64]) -> Result<f64> {
    if weights.is_empty() {
        return Err(Error::Validation("weights must be non-empty".to_string()));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(Error::Validation("weights must be finite and >= 0".to_string()));
    }
    let sum: f64 = weights.iter().sum();
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq == 0.0 {
        return Err(Error::Validation("weights must not all be zero".to_string()));
    }
    Ok(sum * sum / sum_sq)
}

/// Summary statistics of a weight set.
#[derive(Debug, Clone, Serialize)]
pub struct WeightSummary {
    /// Number of weights.
    pub n: usize,
    /// Sum of finite weights.
    pub sum: f64,
    /// Mean of finite weights.
    pub mean: f64,
    /// Smallest finite weight.
    pub min: f64,
    /// Largest finite weight.
    pub max: f64,
    /// Kish effective sample size over finite weights.
    pub ess: f64,
    /// `ess / n_finite`.
    pub ess_fraction: f64,
    /// Number of infinite or NaN weights (naive transform at `y in {0, 1}`).
    pub n_non_finite: usize,
}

/// Summarise weights; non-finite entries are counted and excluded.
///
/// Without a positive finite weight (every `y = 1`, or every `y = 0` under
/// the naive transform) the ESS and its fraction are 0; `mean`, `min` and
/// `max` are NaN when no finite weight is left.
pub fn summarize_weights(weights: &[f64]) -> WeightSummary {
    let finite: Vec<f64> = weights.iter().copied().filter(|w| w.is_finite()).collect();
    let n_non_finite = weights.len() - finite.len();
    let sum: f64 = finite.iter().sum();
    let ess = effective_sample_size(&finite).unwrap_or(0.0);
    let (mean, min, max, ess_fraction) = if finite.is_empty() {
        (f64::NAN, f64::NAN, f64::NAN, 0.0)
    } else {
        (
            sum / finite.len() as f64,
            finite.iter().copied().fold(f64::INFINITY, f64::min),
            finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ess / finite.len() as f64,
        )
    };
    WeightSummary { n: weights.len(), sum, mean, min, max, ess, ess_fraction, n_non_finite }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() as f64 - 1.0);
    let i0 = pos.floor() as usize;
    let i1 = pos.ceil() as usize;
    if i0 == i1 {
        return sorted[i0];
    }
    let f = pos - i0 as f64;
    sorted[i0] * (1.0 - f) + sorted[i1] * f
}

/// Histogram range `[q_lo, q_hi]` of the pooled finite values.
///
/// Degenerate ranges (all values equal) are widened by 0.5 on each side.
pub fn quantile_range(values: &[f64], q_lo: f64, q_hi: f64) -> Result<(f64, f64)> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Err(Error::Validation("cannot derive a range from no finite values".to_string()));
    }
    if !(0.0..=1.0).contains(&q_lo) || !(0.0..=1.0).contains(&q_hi) || q_lo >= q_hi {
        return Err(Error::Validation(format!("invalid quantile range [{}, {}]", q_lo, q_hi)));
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let lo = quantile_sorted(&sorted, q_lo);
    let hi = quantile_sorted(&sorted, q_hi);
    if hi > lo { Ok((lo, hi)) } else { Ok((lo - 0.5, hi + 0.5)) }
}

/// Uniformly binned histogram with weights on `[low, high)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedHistogram {
    low: f64,
    high: f64,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
    underflow: f64,
    overflow: f64,
}

impl WeightedHistogram {
    /// Empty histogram with `n_bins` equal-width bins.
    pub fn new(n_bins: usize, low: f64, high: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Validation("histogram needs at least 1 bin".to_string()));
        }
        if !low.is_finite() || !high.is_finite() || high <= low {
            return Err(Error::Validation(format!("invalid histogram range [{}, {})", low, high)));
        }
        Ok(Self {
            low,
            high,
            sumw: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
        })
    }

    /// Histogram of `values` with per-entry weights (`None` = unit weights).
    pub fn from_values(
        n_bins: usize,
        low: f64,
        high: f64,
        values: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<Self> {
        let mut h = Self::new(n_bins, low, high)?;
        match weights {
            Some(w) => {
                if w.len() != values.len() {
                    return Err(Error::Validation(format!(
                        "values/weights length mismatch: {} vs {}",
                        values.len(),
                        w.len()
                    )));
                }
                for (&x, &wi) in values.iter().zip(w) {
                    h.fill(x, wi);
                }
            }
            None => values.iter().for_each(|&x| h.fill(x, 1.0)),
        }
        Ok(h)
    }

    /// Add one weighted entry; non-finite weights are ignored.
    pub fn fill(&mut self, x: f64, w: f64) {
        if !w.is_finite() || x.is_nan() {
            return;
        }
        if x < self.low {
            self.underflow += w;
        } else if x >= self.high {
            self.overflow += w;
        } else {
            let n = self.sumw.len();
            let idx = (((x - self.low) / (self.high - self.low)) * n as f64) as usize;
            let idx = idx.min(n - 1);
            self.sumw[idx] += w;
            self.sumw2[idx] += w * w;
        }
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.sumw.len()
    }

    /// Bin edges (length `n_bins + 1`).
    pub fn edges(&self) -> Vec<f64> {
        let n = self.sumw.len();
        let width = (self.high - self.low) / n as f64;
        (0..=n).map(|i| self.low + i as f64 * width).collect()
    }

    /// Sum of weights per bin.
    pub fn sumw(&self) -> &[f64] {
        &self.sumw
    }

    /// Sum of squared weights per bin.
    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }

    /// Weight below `low`.
    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    /// Weight at or above `high`.
    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Bin contents and errors scaled by `k`.
    pub fn scaled(&self, k: f64) -> (Vec<f64>, Vec<f64>) {
        let y = self.sumw.iter().map(|v| v * k).collect();
        let err = self.sumw2.iter().map(|v| k * v.sqrt()).collect();
        (y, err)
    }
}

/// Normalise a histogram to unit area. Returns zero-vector if integral <= 0.
pub fn normalise(h: &[f64]) -> Vec<f64> {
    let sum: f64 = h.iter().sum();
    if sum <= 0.0 {
        return vec![0.0; h.len()];
    }
    h.iter().map(|&v| v / sum).collect()
}

/// Separation `0.5 * sum (s - b)^2 / (s + b)` of two unit-normalised shapes.
///
/// 0 for identical shapes, 1 for disjoint ones.
pub fn separation_metric(s: &[f64], b: &[f64]) -> f64 {
    let mut metric = 0.0;
    for (&si, &bi) in s.iter().zip(b) {
        let denom = si + bi;
        if denom > 0.0 {
            let diff = si - bi;
            metric += diff * diff / denom;
        }
    }
    0.5 * metric
}

/// Chi-square of `k * other` against `reference`, using `sumw2` errors of both.
///
/// Returns `(chi2, ndf)` where `ndf` counts bins with a non-zero error.
pub fn chi2_against(reference: &WeightedHistogram, other: &WeightedHistogram, k: f64) -> Result<(f64, usize)> {
    if reference.n_bins() != other.n_bins() {
        return Err(Error::Validation(format!(
            "histogram binning mismatch: {} vs {} bins",
            reference.n_bins(),
            other.n_bins()
        )));
    }
    let mut chi2 = 0.0;
    let mut ndf = 0;
    for i in 0..reference.n_bins() {
        let var = reference.sumw2[i] + k * k * other.sumw2[i];
        if var > 0.0 {
            let d = reference.sumw[i] - k * other.sumw[i];
            chi2 += d * d / var;
            ndf += 1;
        }
    }
    Ok((chi2, ndf))
}

/// Weighted Pearson correlation matrix of row-major events.
pub fn weighted_correlation(rows: &[&[f64]], weights: Option<&[f64]>) -> Result<Vec<Vec<f64>>> {
    let p = rows.first().map(|r| r.len()).ok_or_else(|| {
        Error::Validation("correlation needs at least one event".to_string())
    })?;
    if let Some(w) = weights {
        if w.len() != rows.len() {
            return Err(Error::Validation(format!(
                "rows/weights length mismatch: {} vs {}",
                rows.len(),
                w.len()
            )));
        }
    }
    let weight_of = |i: usize| weights.map_or(1.0, |w| w[i]);

    let mut sw = 0.0;
    let mut mean = vec![0.0; p];
    for (i, r) in rows.iter().enumerate() {
        if r.len() != p {
            return Err(Error::Validation(format!("row {} has {} features, expected {}", i, r.len(), p)));
        }
        let w = weight_of(i);
        if !w.is_finite() {
            continue;
        }
        sw += w;
        for (m, &x) in mean.iter_mut().zip(r.iter()) {
            *m += w * x;
        }
    }
    if sw <= 0.0 {
        return Err(Error::Validation("sum of weights must be > 0".to_string()));
    }
    mean.iter_mut().for_each(|m| *m /= sw);

    let mut cov = vec![vec![0.0; p]; p];
    for (i, r) in rows.iter().enumerate() {
        let w = weight_of(i);
        if !w.is_finite() {
            continue;
        }
        for a in 0..p {
            let da = r[a] - mean[a];
            for b in a..p {
                cov[a][b] += w * da * (r[b] - mean[b]);
            }
        }
    }

    let mut corr = vec![vec![0.0; p]; p];
    for a in 0..p {
        for b in a..p {
            let denom = (cov[a][a] * cov[b][b]).sqrt();
            let c = if denom > 0.0 { cov[a][b] / denom } else if a == b { 1.0 } else { 0.0 };
            corr[a][b] = c;
            corr[b][a] = c;
        }
    }
    Ok(corr)
}

/// Largest absolute element-wise difference between two square matrices.
pub fn max_abs_difference(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    a.iter()
        .zip(b)
        .flat_map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| (x - y).abs()))
        .fold(0.0, f64::max)
}

/// ROC AUC of "MC-ness" scores via the Mann-Whitney statistic.
///
/// Unweighted; ties count one half.
pub fn roc_auc(scores: &[f64], labels: &[Label]) -> Result<f64> {
    weighted_roc_auc(scores, labels, None)
}

/// ROC AUC with per-event weights (`None` = unit weights).
///
/// Evaluated with the reweighted MC against data, a value near 0.5 means the
/// classifier can no longer tell the populations apart. Events with a
/// non-finite weight are skipped.
pub fn weighted_roc_auc(scores: &[f64], labels: &[Label], weights: Option<&[f64]>) -> Result<f64> {
    if scores.len() != labels.len() {
        return Err(Error::Validation(format!(
            "scores/labels length mismatch: {} vs {}",
            scores.len(),
            labels.len()
        )));
    }
    if let Some(w) = weights {
        if w.len() != scores.len() {
            return Err(Error::Validation(format!(
                "scores/weights length mismatch: {} vs {}",
                scores.len(),
                w.len()
            )));
        }
        if w.iter().any(|&x| x < 0.0) {
            return Err(Error::Validation("AUC weights must be >= 0".to_string()));
        }
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(Error::Validation("scores must not contain NaN".to_string()));
    }
    let weight_of = |i: usize| weights.map_or(1.0, |w| w[i]);

    let mut order: Vec<usize> = (0..scores.len()).filter(|&i| weight_of(i).is_finite()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut w_pos = 0.0;
    let mut w_neg = 0.0;
    let mut area = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        let (mut tie_pos, mut tie_neg) = (0.0, 0.0);
        for &k in &order[i..j] {
            match labels[k] {
                Label::Mc => tie_pos += weight_of(k),
                Label::Data => tie_neg += weight_of(k),
            }
        }
        // Data below this score group, plus half of the tied data.
        area += tie_pos * (w_neg + 0.5 * tie_neg);
        w_pos += tie_pos;
        w_neg += tie_neg;
        i = j;
    }
    if w_pos <= 0.0 || w_neg <= 0.0 {
        return Err(Error::Validation(format!(
            "AUC needs positive weight for both labels (mc={}, data={})",
            w_pos, w_neg
        )));
    }
    Ok(area / (w_pos * w_neg))
}

/// Mean binary cross-entropy of probabilities against labels.
///
/// Probabilities are clamped to `[1e-15, 1 - 1e-15]` so a confident miss is
/// large but finite.
pub fn binary_cross_entropy(probabilities: &[f64], labels: &[Label]) -> Result<f64> {
    if probabilities.len() != labels.len() || probabilities.is_empty() {
        return Err(Error::Validation(format!(
            "probabilities/labels must be non-empty and equal length: {} vs {}",
            probabilities.len(),
            labels.len()
        )));
    }
    const EPS: f64 = 1e-15;
    let mut total = 0.0;
    for (&p, &l) in probabilities.iter().zip(labels) {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::Validation(format!("probability must be in [0, 1], got {}", p)));
        }
        let p = p.clamp(EPS, 1.0 - EPS);
        total -= match l {
            Label::Mc => p.ln(),
            Label::Data => (1.0 - p).ln(),
        };
    }
    Ok(total / probabilities.len() as f64)
}

/// Agreement between estimated and true log weights.
#[derive(Debug, Clone, Serialize)]
pub struct TruthComparison {
    /// Pearson correlation of `ln w_est` and `ln w_true`.
    pub log_weight_correlation: f64,
    /// Mean `|ln w_est - ln w_true|`.
    pub mean_abs_log_difference: f64,
    /// Events used (both log weights finite).
    pub n_used: usize,
}

/// Compare estimated against known log density ratios (toy studies only).
pub fn compare_to_truth(log_estimated: &[f64], log_true: &[f64]) -> Result<TruthComparison> {
    if log_estimated.len() != log_true.len() {
        return Err(Error::Validation(format!(
            "log weight length mismatch: {} vs {}",
            log_estimated.len(),
            log_true.len()
        )));
    }
    let pairs: Vec<(f64, f64)> = log_estimated
        .iter()
        .zip(log_true)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.len() < 2 {
        return Err(Error::Validation("need at least 2 finite log weight pairs".to_string()));
    }
    let rows: Vec<[f64; 2]> = pairs.iter().map(|&(a, b)| [a, b]).collect();
    let row_refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
    let corr = weighted_correlation(&row_refs, None)?;
    let mad = pairs.iter().map(|(a, b)| (a - b).abs()).sum::<f64>() / pairs.len() as f64;
    Ok(TruthComparison {
        log_weight_correlation: corr[0][1],
        mean_abs_log_difference: mad,
        n_used: pairs.len(),
    })
}

/// High-level reweighting quality status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    /// All gates passed.
    Ok,
    /// Some gates emitted warnings.
    Warn,
    /// One or more gates failed.
    Fail,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityStatus::Ok => write!(f, "ok"),
            QualityStatus::Warn => write!(f, "warn"),
            QualityStatus::Fail => write!(f, "fail"),
        }
    }
}

/// Thresholds for reweighting quality gates.
#[derive(Debug, Clone, Serialize)]
pub struct QualityGates {
    /// Warn if ESS / n falls below this fraction.
    pub min_ess_fraction_warn: f64,
    /// Fail if ESS / n falls below this fraction.
    pub min_ess_fraction_fail: f64,
    /// Warn if `|sum(MC weights) / n_data - 1|` exceeds this.
    pub max_closure_deviation_warn: f64,
    /// Fail on infinite weights (naive transform at `y in {0, 1}`).
    pub fail_on_non_finite: bool,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            min_ess_fraction_warn: 0.5,
            min_ess_fraction_fail: 0.1,
            max_closure_deviation_warn: 0.1,
            fail_on_non_finite: true,
        }
    }
}

/// Outcome of the quality gates.
#[derive(Debug, Clone, Serialize)]
pub struct QualitySummary {
    /// Aggregated status.
    pub status: QualityStatus,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
    /// Hard failures.
    pub failures: Vec<String>,
}

/// Apply the gates to a weight summary and closure ratio (`sum w_mc / n_data`).
pub fn quality_summary(weights: &WeightSummary, closure_ratio: f64, gates: &QualityGates) -> QualitySummary {
    let mut warnings = Vec::new();
    let mut failures = Vec::new();

    if weights.n_non_finite > 0 && gates.fail_on_non_finite {
        failures.push(format!("{} MC weights are not finite", weights.n_non_finite));
    }
    if weights.ess_fraction < gates.min_ess_fraction_fail {
        failures.push(format!(
            "ESS fraction {:.3} < {:.3}",
            weights.ess_fraction, gates.min_ess_fraction_fail
        ));
    } else if weights.ess_fraction < gates.min_ess_fraction_warn {
        warnings.push(format!(
            "ESS fraction {:.3} < {:.3}",
            weights.ess_fraction, gates.min_ess_fraction_warn
        ));
    }
    if !closure_ratio.is_finite() || (closure_ratio - 1.0).abs() > gates.max_closure_deviation_warn {
        warnings.push(format!("closure ratio {:.4} deviates from 1", closure_ratio));
    }

    let status = if !failures.is_empty() {
        QualityStatus::Fail
    } else if !warnings.is_empty() {
        QualityStatus::Warn
    } else {
        QualityStatus::Ok
    };
    QualitySummary { status, warnings, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_ess_uniform_equals_n() {
        assert_relative_eq!(effective_sample_size(&[2.5; 40]).unwrap(), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ess_single_dominant_weight() {
        let mut w = vec![1e-9; 100];
        w[0] = 1.0;
        assert!(effective_sample_size(&w).unwrap() < 1.01);
    }

    #[test]
    fn test_ess_invalid() {
        assert!(effective_sample_size(&[]).is_err());
        assert!(effective_sample_size(&[0.0, 0.0]).is_err());
        assert!(effective_sample_size(&[1.0, -1.0]).is_err());
        assert!(effective_sample_size(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_summary_counts_non_finite() {
        let s = summarize_weights(&[1.0, 3.0, f64::INFINITY]);
        assert_eq!(s.n, 3);
        assert_eq!(s.n_non_finite, 1);
        assert_eq!(s.sum, 4.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_relative_eq!(s.ess, 16.0 / 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_histogram_fill_and_edges() {
        let h = WeightedHistogram::from_values(4, 0.0, 4.0, &[-1.0, 0.0, 0.5, 3.99, 4.0], Some(&[1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();
        assert_eq!(h.edges(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(h.sumw(), &[5.0, 0.0, 0.0, 4.0]);
        assert_eq!(h.sumw2(), &[13.0, 0.0, 0.0, 16.0]);
        assert_eq!(h.underflow(), 1.0);
        assert_eq!(h.overflow(), 5.0);
        assert_eq!(h.sumw().iter().sum::<f64>(), 9.0);
    }

    #[test]
    fn test_histogram_invalid() {
        assert!(WeightedHistogram::new(0, 0.0, 1.0).is_err());
        assert!(WeightedHistogram::new(3, 1.0, 1.0).is_err());
        assert!(WeightedHistogram::from_values(3, 0.0, 1.0, &[0.1], Some(&[])).is_err());
    }

    #[test]
    fn test_quantile_range() {
        let v: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let (lo, hi) = quantile_range(&v, 0.01, 0.99).unwrap();
        assert_relative_eq!(lo, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hi, 99.0, epsilon = 1e-12);
        assert_eq!(quantile_range(&[2.0, 2.0], 0.0, 1.0).unwrap(), (1.5, 2.5));
    }

    #[test]
    fn test_separation_bounds() {
        let a = vec![0.25; 4];
        assert!(separation_metric(&a, &a).abs() < 1e-12);
        assert!((separation_metric(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-12);
        assert_eq!(normalise(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_chi2_identical_is_zero() {
        let h = WeightedHistogram::from_values(3, 0.0, 3.0, &[0.5, 1.5, 1.6, 2.5], None).unwrap();
        let (chi2, ndf) = chi2_against(&h, &h, 1.0).unwrap();
        assert_eq!(chi2, 0.0);
        assert_eq!(ndf, 3);
    }

    #[test]
    fn test_weighted_correlation() {
        let rows: Vec<[f64; 2]> = vec![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 1.0]];
        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        // Zero weight on the outlier leaves a perfect linear relation.
        let c = weighted_correlation(&refs, Some(&[1.0, 1.0, 1.0, 0.0])).unwrap();
        assert_relative_eq!(c[0][1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(c[1][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(c[0][0], 1.0, epsilon = 1e-12);
        let c_all = weighted_correlation(&refs, None).unwrap();
        assert!(c_all[0][1] < 0.9);
        assert!(max_abs_difference(&c, &c_all) > 0.1);
    }

    #[test]
    fn test_auc_perfect_and_random() {
        let labels = [Label::Data, Label::Data, Label::Mc, Label::Mc];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels).unwrap(), 1.0);
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels).unwrap(), 0.0);
        assert_eq!(roc_auc(&[0.5; 4], &labels).unwrap(), 0.5);
        assert!(roc_auc(&[0.5; 2], &[Label::Mc, Label::Mc]).is_err());
    }

    #[test]
    fn test_weighted_auc() {
        let labels = [Label::Data, Label::Mc, Label::Data, Label::Mc];
        let scores = [0.2, 0.4, 0.6, 0.8];
        assert_relative_eq!(roc_auc(&scores, &labels).unwrap(), 0.75, epsilon = 1e-12);
        let w = [1.0, 3.0, 1.0, 1.0];
        assert_relative_eq!(weighted_roc_auc(&scores, &labels, Some(&w)).unwrap(), 0.625, epsilon = 1e-12);
        // Infinite weights are skipped.
        let w = [1.0, f64::INFINITY, 1.0, 1.0];
        assert_relative_eq!(weighted_roc_auc(&scores, &labels, Some(&w)).unwrap(), 1.0, epsilon = 1e-12);
        assert!(weighted_roc_auc(&scores, &labels, Some(&[1.0, -1.0, 1.0, 1.0])).is_err());
    }

    #[test]
    fn test_bce() {
        let labels = [Label::Data, Label::Mc];
        assert_relative_eq!(
            binary_cross_entropy(&[0.5, 0.5], &labels).unwrap(),
            std::f64::consts::LN_2,
            epsilon = 1e-12
        );
        assert!(binary_cross_entropy(&[1.0, 0.0], &labels).unwrap().is_finite());
        assert!(binary_cross_entropy(&[1.5, 0.0], &labels).is_err());
    }

    #[test]
    fn test_compare_to_truth() {
        let t = compare_to_truth(&[0.0, 1.0, 2.0, f64::INFINITY], &[0.1, 1.1, 2.1, 0.0]).unwrap();
        assert_eq!(t.n_used, 3);
        assert_relative_eq!(t.log_weight_correlation, 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.mean_abs_log_difference, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_quality_gates() {
        let good = summarize_weights(&[1.0; 10]);
        assert_eq!(quality_summary(&good, 1.0, &QualityGates::default()).status, QualityStatus::Ok);
        assert_eq!(quality_summary(&good, 1.5, &QualityGates::default()).status, QualityStatus::Warn);
        let bad = summarize_weights(&[1.0, f64::INFINITY]);
        assert_eq!(quality_summary(&bad, 1.0, &QualityGates::default()).status, QualityStatus::Fail);
    }

    #[test]
    fn test_summary_without_usable_weights_fails_gates() {
        // Every MC event at y = 1: all weights 0.
        let zeros = summarize_weights(&[0.0; 4]);
        assert_eq!(zeros.ess, 0.0);
        assert_eq!(zeros.ess_fraction, 0.0);
        assert_eq!(zeros.n_non_finite, 0);
        assert_eq!(zeros.sum, 0.0);
        let q = quality_summary(&zeros, 0.0, &QualityGates::default());
        assert_eq!(q.status, QualityStatus::Fail);

        // Every MC event at y = 0: all weights infinite.
        let infs = summarize_weights(&[f64::INFINITY; 3]);
        assert_eq!(infs.ess, 0.0);
        assert_eq!(infs.ess_fraction, 0.0);
        assert_eq!(infs.n_non_finite, 3);
        assert!(infs.mean.is_nan());
        let q = quality_summary(&infs, f64::INFINITY, &QualityGates::default());
        assert_eq!(q.status, QualityStatus::Fail);
        assert_eq!(q.failures.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_ess_bounded_by_n(w in proptest::collection::vec(0.0f64..100.0, 1..200)) {
            prop_assume!(w.iter().any(|&x| x > 0.0));
            let ess = effective_sample_size(&w).unwrap();
            prop_assert!(ess <= w.len() as f64 * (1.0 + 1e-12));
            prop_assert!(ess >= 1.0 - 1e-12);
        }
    }
}
