//! End-to-end reweighting: assemble, split, train, weight, diagnose.

use rw_core::{Classifier, Error, Label, Result};
use rw_prob::math::logit;
use serde::{Deserialize, Serialize};

use crate::classifier::{MlpClassifier, MlpConfig, TrainingSummary};
use crate::dataset::{TrainTestSplit, assemble, shuffle_split};
use crate::diagnostics::{
    QualityGates, QualitySummary, TruthComparison, WeightSummary, binary_cross_entropy,
    compare_to_truth, quality_summary, roc_auc, summarize_weights, weighted_roc_auc,
};
use crate::toys::{ToyConfig, ToySamples, generate, true_log_mc_weight};
use crate::weights::{WeightCalculator, WeightConfig, normalize_weights};

/// Configuration of a full reweighting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Toy populations (ignored when samples are supplied externally).
    pub toy: ToyConfig,
    /// Fraction of events used for training.
    pub train_fraction: f64,
    /// Shuffle seed for the split.
    pub split_seed: u64,
    /// Network and optimizer.
    pub classifier: MlpConfig,
    /// Probability-to-weight options.
    pub weights: WeightConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            toy: ToyConfig::default(),
            train_fraction: 0.5,
            split_seed: 1234,
            classifier: MlpConfig::default(),
            weights: WeightConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(Error::Validation(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        self.classifier.validate()?;
        self.weights.validate()
    }
}

/// Reweighted MC integral against the data count on the test split.
#[derive(Debug, Clone, Serialize)]
pub struct ClosureSummary {
    /// Data events in the test split.
    pub n_data: usize,
    /// MC events in the test split.
    pub n_mc: usize,
    /// Scale applied to `1/w` to express MC in data units.
    pub mc_scale: f64,
    /// Sum of final MC weights (before optional normalisation).
    pub sum_mc_weights: f64,
    /// `sum_mc_weights / n_data`.
    pub ratio: f64,
}

/// Everything produced by a reweighting run.
#[derive(Debug, Clone)]
pub struct ReweightOutcome {
    /// Train/test split actually used.
    pub split: TrainTestSplit,
    /// Classifier training diagnostics.
    pub training: TrainingSummary,
    /// `P(MC | x)` for every test event, in test-set order.
    pub test_probabilities: Vec<f64>,
    /// Final weights of the test MC events, in test-set order of MC events.
    pub mc_weights: Vec<f64>,
    /// Odds prior factor used (`n_data / n_mc` of the training set, or 1).
    pub prior_ratio: f64,
    /// Weight statistics (ESS, range, non-finite count).
    pub weight_summary: WeightSummary,
    /// Reweighted integral closure.
    pub closure: ClosureSummary,
    /// Classifier ROC AUC on the test split.
    pub test_auc: f64,
    /// Same AUC with the MC events carrying their final weights; `None` when
    /// no MC event has a positive finite weight.
    pub test_auc_reweighted: Option<f64>,
    /// Classifier mean BCE on the test split.
    pub test_bce: f64,
    /// Agreement with the known density ratio (toy inputs only).
    pub truth: Option<TruthComparison>,
    /// Quality gate outcome.
    pub quality: QualitySummary,
}

impl ReweightOutcome {
    /// Test-set MC probabilities aligned with `mc_weights`.
    pub fn mc_probabilities(&self) -> Vec<f64> {
        self.split
            .test
            .samples()
            .iter()
            .zip(&self.test_probabilities)
            .filter(|(s, _)| s.label() == Label::Mc)
            .map(|(_, &p)| p)
            .collect()
    }
}

/// Generate toys from `config.toy` and reweight them (truth comparison included).
pub fn run_toy(config: &PipelineConfig) -> Result<(ToySamples, ReweightOutcome)> {
    let samples = generate(&config.toy)?;
    let outcome = reweight(samples.data.clone(), samples.mc.clone(), config, Some(&config.toy))?;
    Ok((samples, outcome))
}

/// Reweight MC rows toward data rows.
///
/// When `truth` is given, the learned log weights are compared to the exact
/// density ratio of the toy populations.
pub fn reweight(
    data: Vec<Vec<f64>>,
    mc: Vec<Vec<f64>>,
    config: &PipelineConfig,
    truth: Option<&ToyConfig>,
) -> Result<ReweightOutcome> {
    config.validate()?;
    let dataset = assemble(data, mc)?;
    let split = shuffle_split(dataset, config.train_fraction, config.split_seed)?;
    let clf = MlpClassifier::fit(&split.train, &config.classifier)?;
    let training = clf.summary().clone();
    reweight_split(split, &clf, training, config, truth)
}

/// Score the test half of `split` with a trained classifier and derive MC
/// weights, closure, AUCs and quality gates.
pub fn reweight_split(
    split: TrainTestSplit,
    clf: &dyn Classifier,
    training: TrainingSummary,
    config: &PipelineConfig,
    truth: Option<&ToyConfig>,
) -> Result<ReweightOutcome> {
    config.validate()?;
    let n_data_train = split.train.count(Label::Data);
    let n_mc_train = split.train.count(Label::Mc);
    let n_data_test = split.test.count(Label::Data);
    let n_mc_test = split.test.count(Label::Mc);
    if n_data_test == 0 || n_mc_test == 0 {
        return Err(Error::Validation(format!(
            "test split needs both labels (data={}, mc={})",
            n_data_test, n_mc_test
        )));
    }

    let probs = clf.predict_proba_dataset(&split.test)?;
    let labels: Vec<Label> = split.test.samples().iter().map(|s| s.label()).collect();
    let test_auc = roc_auc(&probs, &labels)?;
    let test_bce = binary_cross_entropy(&probs, &labels)?;
    tracing::info!(auc = test_auc, bce = test_bce, "classifier scored on test split");

    let calc = WeightCalculator::from_config(&config.weights, n_data_train, n_mc_train)?;
    let mc_probs: Vec<f64> = probs
        .iter()
        .zip(&labels)
        .filter(|(_, l)| **l == Label::Mc)
        .map(|(&p, _)| p)
        .collect();

    // Prior-corrected weights estimate p_data/p_mc and need the test-set
    // luminosity factor; raw odds already carry the training class ratio.
    let mc_scale =
        if config.weights.prior_correction { n_data_test as f64 / n_mc_test as f64 } else { 1.0 };
    let raw: Vec<f64> = calc.mc_weights(&mc_probs)?.into_iter().map(|w| w * mc_scale).collect();

    let sum_mc_weights: f64 = raw.iter().sum();
    let closure = ClosureSummary {
        n_data: n_data_test,
        n_mc: n_mc_test,
        mc_scale,
        sum_mc_weights,
        ratio: sum_mc_weights / n_data_test as f64,
    };
    tracing::info!(ratio = closure.ratio, "reweighted MC closure");

    let finite_sum: f64 = raw.iter().filter(|w| w.is_finite()).sum();
    let mc_weights = if config.weights.normalize && finite_sum > 0.0 {
        normalize_weights(&raw, n_data_test as f64)?
    } else {
        if config.weights.normalize {
            tracing::warn!("no positive finite MC weight; normalisation skipped");
        }
        raw
    };
    let weight_summary = summarize_weights(&mc_weights);

    let mut mc_iter = mc_weights.iter();
    let event_weights: Vec<f64> = labels
        .iter()
        .map(|l| match l {
            Label::Data => 1.0,
            Label::Mc => mc_iter.next().copied().unwrap_or(f64::NAN),
        })
        .collect();
    let test_auc_reweighted = if mc_weights.iter().any(|w| w.is_finite() && *w > 0.0) {
        let auc = weighted_roc_auc(&probs, &labels, Some(&event_weights))?;
        tracing::info!(auc, "classifier AUC after reweighting");
        Some(auc)
    } else {
        tracing::warn!("no positive finite MC weight; reweighted AUC undefined");
        None
    };
    if weight_summary.n_non_finite > 0 {
        tracing::warn!(n = weight_summary.n_non_finite, "non-finite MC weights (probability at 0 or 1)");
    }
    tracing::info!(ess = weight_summary.ess, ess_fraction = weight_summary.ess_fraction, "MC weights computed");

    let truth = match truth {
        Some(toy) => {
            let prior_ln = (n_data_train as f64 / n_mc_train as f64).ln();
            let log_est: Vec<f64> = mc_probs.iter().map(|&y| -(logit(y) + prior_ln)).collect();
            if log_est.iter().filter(|v| v.is_finite()).count() < 2 {
                tracing::warn!("fewer than 2 finite learned log weights; truth comparison skipped");
                None
            } else {
                let rows = split.test.rows_with_label(Label::Mc);
                let log_true = true_log_mc_weight(toy, &rows)?;
                let cmp = compare_to_truth(&log_est, &log_true)?;
                tracing::debug!(
                    corr = cmp.log_weight_correlation,
                    mad = cmp.mean_abs_log_difference,
                    "learned vs true log weights"
                );
                Some(cmp)
            }
        }
        None => None,
    };

    let quality = quality_summary(&weight_summary, closure.ratio, &QualityGates::default());
    for w in &quality.warnings {
        tracing::warn!("{}", w);
    }

    Ok(ReweightOutcome {
        training,
        prior_ratio: calc.prior_ratio(),
        split,
        test_probabilities: probs,
        mc_weights,
        weight_summary,
        closure,
        test_auc,
        test_auc_reweighted,
        test_bce,
        truth,
        quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::QualityStatus;
    use crate::optimizer::OptimizerConfig;

    fn quick_config(n: usize) -> PipelineConfig {
        PipelineConfig {
            toy: ToyConfig { n_data: n, n_mc: n, ..ToyConfig::default() },
            classifier: MlpConfig {
                hidden: vec![8],
                optimizer: OptimizerConfig { max_iter: 200, ..OptimizerConfig::default() },
                ..MlpConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_pipeline_shapes() {
        let (samples, out) = run_toy(&quick_config(400)).unwrap();
        assert_eq!(samples.data.len(), 400);
        assert_eq!(out.split.train.len() + out.split.test.len(), 800);
        assert_eq!(out.test_probabilities.len(), out.split.test.len());
        assert_eq!(out.mc_weights.len(), out.split.test.count(Label::Mc));
        assert_eq!(out.mc_probabilities().len(), out.mc_weights.len());
        assert!(out.truth.is_some());
        assert!(out.test_probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_normalize_forces_exact_closure_sum() {
        let mut cfg = quick_config(300);
        cfg.weights.normalize = true;
        cfg.weights.clip_epsilon = Some(1e-6);
        let (_, out) = run_toy(&cfg).unwrap();
        let sum: f64 = out.mc_weights.iter().sum();
        assert!((sum - out.closure.n_data as f64).abs() < 1e-6 * sum);
    }

    /// Scores every event with a fixed probability, except events whose first
    /// feature is negative, which get `low`.
    struct FixedScore {
        high: f64,
        low: f64,
    }

    impl Classifier for FixedScore {
        fn n_features(&self) -> usize {
            3
        }

        fn predict_proba(&self, features: &[f64]) -> Result<f64> {
            Ok(if features[0] < 0.0 { self.low } else { self.high })
        }
    }

    fn fixed_split() -> TrainTestSplit {
        let data: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 - 20.0, 1.0, 0.5]).collect();
        let mc: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 - 20.0, 2.0, -0.5]).collect();
        shuffle_split(assemble(data, mc).unwrap(), 0.5, 3).unwrap()
    }

    fn no_training() -> TrainingSummary {
        TrainingSummary {
            n_params: 0,
            n_train: 0,
            final_loss: 0.0,
            converged: true,
            n_iter: 0,
            n_fev: 0,
            n_gev: 0,
            message: String::new(),
        }
    }

    fn fixed_config(normalize: bool) -> PipelineConfig {
        PipelineConfig {
            weights: WeightConfig { normalize, ..WeightConfig::default() },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_all_mc_at_one_reports_failure() {
        let clf = FixedScore { high: 1.0, low: 1.0 };
        let toy = ToyConfig::default();
        for normalize in [false, true] {
            let out =
                reweight_split(fixed_split(), &clf, no_training(), &fixed_config(normalize), Some(&toy))
                    .unwrap();
            assert!(out.mc_weights.iter().all(|&w| w == 0.0));
            assert_eq!(out.closure.ratio, 0.0);
            assert_eq!(out.weight_summary.ess, 0.0);
            assert_eq!(out.test_auc_reweighted, None);
            assert!(out.truth.is_none());
            assert_eq!(out.quality.status, QualityStatus::Fail);
        }
    }

    #[test]
    fn test_all_mc_at_zero_reports_failure() {
        let clf = FixedScore { high: 0.0, low: 0.0 };
        let out = reweight_split(fixed_split(), &clf, no_training(), &fixed_config(true), None).unwrap();
        assert!(out.mc_weights.iter().all(|w| w.is_infinite()));
        assert!(out.closure.ratio.is_infinite());
        assert_eq!(out.weight_summary.n_non_finite, out.mc_weights.len());
        assert_eq!(out.weight_summary.ess_fraction, 0.0);
        assert_eq!(out.test_auc_reweighted, None);
        assert_eq!(out.quality.status, QualityStatus::Fail);
    }

    #[test]
    fn test_normalize_leaves_infinite_weights() {
        let clf = FixedScore { high: 0.5, low: 0.0 };
        let out = reweight_split(fixed_split(), &clf, no_training(), &fixed_config(true), None).unwrap();
        let n_inf = out.mc_weights.iter().filter(|w| w.is_infinite()).count();
        assert!(n_inf > 0 && n_inf < out.mc_weights.len());
        let finite_sum: f64 = out.mc_weights.iter().filter(|w| w.is_finite()).sum();
        assert!((finite_sum - out.closure.n_data as f64).abs() < 1e-9);
        assert!(out.test_auc_reweighted.is_some());
        assert_eq!(out.weight_summary.n_non_finite, n_inf);
        assert_eq!(out.quality.status, QualityStatus::Fail);
    }

    #[test]
    fn test_invalid_config() {
        let cfg = PipelineConfig { train_fraction: 1.0, ..PipelineConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = PipelineConfig {
            weights: WeightConfig { clip_epsilon: Some(0.7), ..WeightConfig::default() },
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
