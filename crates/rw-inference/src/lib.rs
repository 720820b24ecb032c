//! # rw-inference
//!
//! Classifier-based MC reweighting.
//!
//! This crate provides:
//! - Toy data/MC populations with known density ratio
//! - Dataset assembly and seeded train/test splitting
//! - A small feed-forward classifier trained with L-BFGS
//! - Odds-ratio weights and their diagnostics (ESS, histograms, correlations, AUC)
//!
//! The `Classifier` trait from rw-core separates training from weight
//! computation, so any probability model can feed [`weights`].

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Feed-forward network classifier (tanh/softplus hidden layers, sigmoid output).
pub mod classifier;
/// Labelled dataset assembly and train/test split.
pub mod dataset;
/// Weight diagnostics: ESS, weighted histograms, correlations, AUC, quality gates.
pub mod diagnostics;
/// Generic numerical optimizer (L-BFGS backend).
pub mod optimizer;
/// End-to-end reweighting run.
pub mod pipeline;
/// Per-feature standardization fitted on the training set.
pub mod standardize;
/// Toy data/MC generation with exact density ratio.
pub mod toys;
/// Probability-to-weight transform.
pub mod weights;

pub use classifier::{Activation, MlpClassifier, MlpConfig, TrainingSummary};
pub use dataset::{TrainTestSplit, assemble, shuffle_split};
pub use diagnostics::{QualityGates, QualityStatus, WeightSummary, WeightedHistogram, effective_sample_size};
pub use optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use pipeline::{ClosureSummary, PipelineConfig, ReweightOutcome, reweight, reweight_split, run_toy};
pub use toys::{ToyConfig, ToySamples};
pub use weights::{WeightCalculator, WeightConfig, odds_weight};
