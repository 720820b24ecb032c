//! # rw-viz
//!
//! Plot-ready artifacts for MC reweighting.
//!
//! This crate emits plot-friendly JSON structures (arrays instead of nested
//! objects); rendering is left to downstream tools.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Correlation matrices of data, raw MC and reweighted MC.
pub mod corr;
/// Per-feature marginal histograms with chi2 and separation.
pub mod marginals;
/// Combined reweighting artifact with metadata.
pub mod reweight;

pub use corr::CorrelationArtifact;
pub use marginals::{BinningConfig, MarginalArtifact};
pub use reweight::{ArtifactOptions, ReweightArtifact, reweight_artifact};
