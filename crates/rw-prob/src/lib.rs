//! Probability building blocks for mcreweight.
//!
//! This crate hosts:
//! - small numeric helpers (stable log/exp/sigmoid primitives) shared by the
//!   classifier loss and the weight transform
//! - 1D feature distributions (sampling + log-density)
//! - toy populations: per-feature distributions plus a linear mixing transform

pub mod distributions;
pub mod math;
pub mod toy;

pub use distributions::FeatureDistribution;
pub use toy::Population;
