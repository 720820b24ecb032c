//! Odds-ratio weights from classifier probabilities.
//!
//! With `y = P(MC | x)` from a classifier trained on balanced classes,
//! `w = y / (1 - y)` estimates `p_MC(x) / p_data(x)`. Scaling each MC event by
//! `1 / w` moves the MC distribution onto the data distribution over the full
//! feature vector.
//!
//! The bare transform applies no clipping: `y = 1` gives `w = +inf` and
//! `y = 0` gives `w = 0`. [`WeightCalculator`] can optionally clip `y` and
//! correct the odds for unbalanced training classes.

use rw_core::{Error, Result};
use serde::{Deserialize, Serialize};

fn validate_probability(y: f64) -> Result<()> {
    if !y.is_finite() || !(0.0..=1.0).contains(&y) {
        return Err(Error::Validation(format!("probability must be in [0, 1], got {}", y)));
    }
    Ok(())
}

/// Naive odds `y / (1 - y)`; `+inf` at `y = 1`.
pub fn odds_weight(y: f64) -> Result<f64> {
    validate_probability(y)?;
    if y == 1.0 {
        return Ok(f64::INFINITY);
    }
    Ok(y / (1.0 - y))
}

/// Options for turning probabilities into MC event weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Clamp `y` to `[eps, 1 - eps]` before the transform. `None` keeps the naive transform.
    pub clip_epsilon: Option<f64>,
    /// Multiply the odds by `n_data / n_mc` of the training set.
    pub prior_correction: bool,
    /// Rescale MC weights so their sum equals the number of data events.
    pub normalize: bool,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self { clip_epsilon: None, prior_correction: true, normalize: false }
    }
}

impl WeightConfig {
    /// Validate the clip range.
    pub fn validate(&self) -> Result<()> {
        if let Some(eps) = self.clip_epsilon {
            if !eps.is_finite() || eps <= 0.0 || eps >= 0.5 {
                return Err(Error::Validation(format!(
                    "clip_epsilon must be in (0, 0.5), got {}",
                    eps
                )));
            }
        }
        Ok(())
    }
}

/// Converts classifier probabilities into density-ratio and MC weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightCalculator {
    clip_epsilon: Option<f64>,
    prior_ratio: f64,
}

impl Default for WeightCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightCalculator {
    /// Naive calculator: no clipping, no prior correction.
    pub fn new() -> Self {
        Self { clip_epsilon: None, prior_ratio: 1.0 }
    }

    /// Clamp probabilities to `[eps, 1 - eps]`.
    pub fn with_clip(mut self, eps: f64) -> Result<Self> {
        WeightConfig { clip_epsilon: Some(eps), ..WeightConfig::default() }.validate()?;
        self.clip_epsilon = Some(eps);
        Ok(self)
    }

    /// Correct for the training class balance.
    ///
    /// Unbalanced classes shift the odds by `n_mc / n_data`; multiplying by
    /// `n_data / n_mc` restores the density ratio. Balanced classes give 1.
    pub fn with_class_counts(mut self, n_data: usize, n_mc: usize) -> Result<Self> {
        if n_data == 0 || n_mc == 0 {
            return Err(Error::Validation(format!(
                "class counts must be > 0 (data={}, mc={})",
                n_data, n_mc
            )));
        }
        self.prior_ratio = n_data as f64 / n_mc as f64;
        Ok(self)
    }

    /// Build from a [`WeightConfig`] and the training class counts.
    pub fn from_config(config: &WeightConfig, n_data: usize, n_mc: usize) -> Result<Self> {
        config.validate()?;
        let mut calc = Self::new();
        if let Some(eps) = config.clip_epsilon {
            calc = calc.with_clip(eps)?;
        }
        if config.prior_correction {
            calc = calc.with_class_counts(n_data, n_mc)?;
        }
        Ok(calc)
    }

    /// Prior factor applied to the odds.
    pub fn prior_ratio(&self) -> f64 {
        self.prior_ratio
    }

    /// Density-ratio estimate `w(y) = prior * y / (1 - y)`.
    pub fn weight(&self, y: f64) -> Result<f64> {
        validate_probability(y)?;
        let y = match self.clip_epsilon {
            Some(eps) => y.clamp(eps, 1.0 - eps),
            None => y,
        };
        Ok(self.prior_ratio * odds_weight(y)?)
    }

    /// MC event weight `1 / w(y)`; `+inf` when `w = 0`.
    pub fn mc_weight(&self, y: f64) -> Result<f64> {
        let w = self.weight(y)?;
        if w == 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(1.0 / w)
    }

    /// MC event weights for a batch of probabilities.
    pub fn mc_weights(&self, probabilities: &[f64]) -> Result<Vec<f64>> {
        probabilities.iter().map(|&y| self.mc_weight(y)).collect()
    }
}

/// Rescale the finite weights so they sum to `target_sum`.
///
/// Non-finite entries are passed through unchanged.
pub fn normalize_weights(weights: &[f64], target_sum: f64) -> Result<Vec<f64>> {
    if !target_sum.is_finite() || target_sum <= 0.0 {
        return Err(Error::Validation(format!("target sum must be > 0, got {}", target_sum)));
    }
    let sum: f64 = weights.iter().filter(|w| w.is_finite()).sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(Error::Computation(format!("cannot normalise weights with finite sum {}", sum)));
    }
    let k = target_sum / sum;
    Ok(weights.iter().map(|&w| if w.is_finite() { w * k } else { w }).collect())
}
