//! Top-level reweighting artifact: classifier, weights, closure, marginals,
//! correlations and quality gates in one JSON document.

use std::time::{SystemTime, UNIX_EPOCH};

use rw_core::{Error, Label, Result};
use rw_inference::classifier::TrainingSummary;
use rw_inference::diagnostics::{
    QualitySummary, TruthComparison, WeightSummary, WeightedHistogram,
};
use rw_inference::pipeline::{ClosureSummary, ReweightOutcome};
use serde::Serialize;

use crate::corr::{CorrelationArtifact, correlation_artifact};
use crate::marginals::{BinningConfig, MarginalArtifact, marginal_artifacts};

/// Schema identifier written into every reweight artifact.
pub const SCHEMA_VERSION: &str = "mcreweight_reweight_v0";

#[derive(Debug, Clone, Serialize)]
pub struct ReweightArtifact {
    pub schema_version: String,
    pub meta: ArtifactMeta,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub classifier: ClassifierArtifact,
    pub weights: WeightsArtifact,
    pub closure: ClosureSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth: Option<TruthComparison>,
    pub marginals: Vec<MarginalArtifact>,
    pub correlations: CorrelationArtifact,
    pub quality: QualitySummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactMeta {
    pub tool: String,
    pub tool_version: String,
    pub created_unix_ms: u128,
    pub parity_mode: ParityMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParityMode {
    pub threads: usize,
    pub stable_ordering: bool,
}

/// Classifier output on the test split.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierArtifact {
    pub training: TrainingSummary,
    pub test_auc: f64,
    pub test_auc_reweighted: Option<f64>,
    pub test_bce: f64,
    pub prior_ratio: f64,
    /// Edges of the score histograms on `[0, 1]`.
    pub score_edges: Vec<f64>,
    pub score_data: Vec<f64>,
    pub score_mc: Vec<f64>,
    pub score_mc_reweighted: Vec<f64>,
}

/// Distribution of the final MC weights.
#[derive(Debug, Clone, Serialize)]
pub struct WeightsArtifact {
    pub summary: WeightSummary,
    /// Edges of the `log10(w)` histogram (empty when no positive finite weight).
    pub log10_edges: Vec<f64>,
    pub log10_counts: Vec<f64>,
}

/// Options that only affect the artifact metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactOptions {
    /// Worker threads used for the run (`0` = auto).
    pub threads: usize,
    /// Zero the timestamp so repeated runs are byte-identical.
    pub deterministic: bool,
}

fn now_unix_ms() -> Result<u128> {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Computation(format!("system time error: {}", e)))?;
    Ok(d.as_millis())
}

/// Default feature names `x0, x1, ...`.
pub fn feature_names(n: usize) -> Vec<String> {
    (0..n).map(|j| format!("x{}", j)).collect()
}

fn classifier_artifact(outcome: &ReweightOutcome, n_bins: usize) -> Result<ClassifierArtifact> {
    let mut h_data = WeightedHistogram::new(n_bins, 0.0, 1.0)?;
    let mut h_mc = WeightedHistogram::new(n_bins, 0.0, 1.0)?;
    let mut h_rw = WeightedHistogram::new(n_bins, 0.0, 1.0)?;
    let mut mc_w = outcome.mc_weights.iter();
    for (s, &p) in outcome.split.test.samples().iter().zip(&outcome.test_probabilities) {
        // p = 1 belongs in the last bin.
        let x = p.min(1.0 - 1e-12);
        match s.label() {
            Label::Data => h_data.fill(x, 1.0),
            Label::Mc => {
                h_mc.fill(x, 1.0);
                if let Some(&w) = mc_w.next() {
                    h_rw.fill(x, w);
                }
            }
        }
    }
    Ok(ClassifierArtifact {
        training: outcome.training.clone(),
        test_auc: outcome.test_auc,
        test_auc_reweighted: outcome.test_auc_reweighted,
        test_bce: outcome.test_bce,
        prior_ratio: outcome.prior_ratio,
        score_edges: h_data.edges(),
        score_data: h_data.sumw().to_vec(),
        score_mc: h_mc.sumw().to_vec(),
        score_mc_reweighted: h_rw.sumw().to_vec(),
    })
}

fn weights_artifact(outcome: &ReweightOutcome, n_bins: usize) -> Result<WeightsArtifact> {
    let logs: Vec<f64> =
        outcome.mc_weights.iter().filter(|w| w.is_finite() && **w > 0.0).map(|w| w.log10()).collect();
    let (log10_edges, log10_counts) = if logs.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        let lo = logs.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if hi > lo { (lo, hi + 1e-9 * (hi - lo)) } else { (lo - 0.5, hi + 0.5) };
        let h = WeightedHistogram::from_values(n_bins, lo, hi, &logs, None)?;
        (h.edges(), h.sumw().to_vec())
    };
    Ok(WeightsArtifact { summary: outcome.weight_summary.clone(), log10_edges, log10_counts })
}

/// Build the full artifact from a finished run.
pub fn reweight_artifact(
    outcome: &ReweightOutcome,
    binning: &BinningConfig,
    options: ArtifactOptions,
) -> Result<ReweightArtifact> {
    binning.validate()?;
    let test = &outcome.split.test;
    let names = feature_names(test.n_features());
    let data_rows = test.rows_with_label(Label::Data);
    let mc_rows = test.rows_with_label(Label::Mc);

    let created_unix_ms = if options.deterministic { 0 } else { now_unix_ms()? };

    Ok(ReweightArtifact {
        schema_version: SCHEMA_VERSION.to_string(),
        meta: ArtifactMeta {
            tool: "mcreweight".to_string(),
            tool_version: rw_core::VERSION.to_string(),
            created_unix_ms,
            parity_mode: ParityMode { threads: options.threads, stable_ordering: true },
        },
        n_features: test.n_features(),
        n_train: outcome.split.train.len(),
        n_test: test.len(),
        classifier: classifier_artifact(outcome, binning.n_bins)?,
        weights: weights_artifact(outcome, binning.n_bins)?,
        closure: outcome.closure.clone(),
        truth: outcome.truth.clone(),
        marginals: marginal_artifacts(&names, &data_rows, &mc_rows, &outcome.mc_weights, binning)?,
        correlations: correlation_artifact(&names, &data_rows, &mc_rows, &outcome.mc_weights)?,
        quality: outcome.quality.clone(),
    })
}
