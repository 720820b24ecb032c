//! One-dimensional feature distributions used to build toy populations.
//!
//! Each variant can be sampled (via `rand_distr`) and evaluated as a
//! log-density, so the generating density of a toy population is known
//! exactly and learned weights can be compared against the true ratio.

use rand::Rng;
use rand::distr::Uniform;
use rand_distr::{Distribution, Exp, Gamma, Normal, StudentT};
use rw_core::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

/// Natural log of `sqrt(2π)`.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Natural log of π.
const LN_PI: f64 = 1.144_729_885_849_400_2;

/// A univariate distribution for one latent feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDistribution {
    /// `N(mu, sigma)`
    Normal {
        /// Mean
        mu: f64,
        /// Standard deviation (> 0)
        sigma: f64,
    },
    /// Exponential with rate `rate` (support `x >= 0`)
    Exponential {
        /// Rate (> 0)
        rate: f64,
    },
    /// Gamma with `shape` and `scale` (support `x >= 0`)
    Gamma {
        /// Shape (> 0)
        shape: f64,
        /// Scale (> 0)
        scale: f64,
    },
    /// Uniform on `[low, high)`
    Uniform {
        /// Lower edge
        low: f64,
        /// Upper edge (> low)
        high: f64,
    },
    /// Location-scale Student-t
    StudentT {
        /// Degrees of freedom (> 0)
        nu: f64,
        /// Location
        mu: f64,
        /// Scale (> 0)
        sigma: f64,
    },
}

fn require_positive(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v <= 0.0 {
        return Err(Error::Validation(format!("{} must be finite and > 0, got {}", name, v)));
    }
    Ok(())
}

fn require_finite(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() {
        return Err(Error::Validation(format!("{} must be finite, got {}", name, v)));
    }
    Ok(())
}

/// Concrete sampler built once per batch.
enum Sampler {
    Normal(Normal<f64>),
    Exponential(Exp<f64>),
    Gamma(Gamma<f64>),
    Uniform(Uniform<f64>),
    StudentT { t: StudentT<f64>, mu: f64, sigma: f64 },
}

impl Distribution<f64> for Sampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Normal(d) => d.sample(rng),
            Sampler::Exponential(d) => d.sample(rng),
            Sampler::Gamma(d) => d.sample(rng),
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::StudentT { t, mu, sigma } => mu + sigma * t.sample(rng),
        }
    }
}

impl FeatureDistribution {
    /// Check that parameters are inside the distribution's domain.
    pub fn validate(&self) -> Result<()> {
        match *self {
            FeatureDistribution::Normal { mu, sigma } => {
                require_finite("mu", mu)?;
                require_positive("sigma", sigma)
            }
            FeatureDistribution::Exponential { rate } => require_positive("rate", rate),
            FeatureDistribution::Gamma { shape, scale } => {
                require_positive("shape", shape)?;
                require_positive("scale", scale)
            }
            FeatureDistribution::Uniform { low, high } => {
                require_finite("low", low)?;
                require_finite("high", high)?;
                if high <= low {
                    return Err(Error::Validation(format!(
                        "uniform requires low < high, got [{}, {})",
                        low, high
                    )));
                }
                Ok(())
            }
            FeatureDistribution::StudentT { nu, mu, sigma } => {
                require_positive("nu", nu)?;
                require_finite("mu", mu)?;
                require_positive("sigma", sigma)
            }
        }
    }

    fn sampler(&self) -> Result<Sampler> {
        self.validate()?;
        let bad = |e: &dyn std::fmt::Display| Error::Validation(format!("{:?}: {}", self, e));
        Ok(match *self {
            FeatureDistribution::Normal { mu, sigma } => {
                Sampler::Normal(Normal::new(mu, sigma).map_err(|e| bad(&e))?)
            }
            FeatureDistribution::Exponential { rate } => {
                Sampler::Exponential(Exp::new(rate).map_err(|e| bad(&e))?)
            }
            FeatureDistribution::Gamma { shape, scale } => {
                Sampler::Gamma(Gamma::new(shape, scale).map_err(|e| bad(&e))?)
            }
            FeatureDistribution::Uniform { low, high } => {
                Sampler::Uniform(Uniform::new(low, high).map_err(|e| bad(&e))?)
            }
            FeatureDistribution::StudentT { nu, mu, sigma } => {
                Sampler::StudentT { t: StudentT::new(nu).map_err(|e| bad(&e))?, mu, sigma }
            }
        })
    }

    /// Draw `n` values.
    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let sampler = self.sampler()?;
        Ok((0..n).map(|_| sampler.sample(rng)).collect())
    }

    /// Log-density at `x` (`-inf` outside the support).
    pub fn logpdf(&self, x: f64) -> Result<f64> {
        self.validate()?;
        Ok(match *self {
            FeatureDistribution::Normal { mu, sigma } => {
                let z = (x - mu) / sigma;
                -0.5 * z * z - sigma.ln() - LN_SQRT_2PI
            }
            FeatureDistribution::Exponential { rate } => {
                if x < 0.0 {
                    f64::NEG_INFINITY
                } else {
                    rate.ln() - rate * x
                }
            }
            FeatureDistribution::Gamma { shape, scale } => {
                if x < 0.0 {
                    f64::NEG_INFINITY
                } else if x == 0.0 {
                    if shape < 1.0 {
                        f64::INFINITY
                    } else if shape > 1.0 {
                        f64::NEG_INFINITY
                    } else {
                        -scale.ln()
                    }
                } else {
                    -ln_gamma(shape) - shape * scale.ln() + (shape - 1.0) * x.ln() - x / scale
                }
            }
            FeatureDistribution::Uniform { low, high } => {
                if x < low || x >= high {
                    f64::NEG_INFINITY
                } else {
                    -(high - low).ln()
                }
            }
            FeatureDistribution::StudentT { nu, mu, sigma } => {
                let z = (x - mu) / sigma;
                ln_gamma(0.5 * (nu + 1.0)) - ln_gamma(0.5 * nu) - 0.5 * (nu.ln() + LN_PI)
                    - sigma.ln()
                    - 0.5 * (nu + 1.0) * (z * z / nu).ln_1p()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_normal_logpdf_standard_at_zero() {
        let d = FeatureDistribution::Normal { mu: 0.0, sigma: 1.0 };
        assert_relative_eq!(d.logpdf(0.0).unwrap(), -LN_SQRT_2PI, epsilon = 1e-12);
    }

    #[test]
    fn test_exponential_logpdf() {
        let d = FeatureDistribution::Exponential { rate: 2.0 };
        assert_relative_eq!(d.logpdf(0.5).unwrap(), 2.0f64.ln() - 1.0, epsilon = 1e-12);
        assert_eq!(d.logpdf(-0.1).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_gamma_shape_one_is_exponential() {
        let g = FeatureDistribution::Gamma { shape: 1.0, scale: 0.5 };
        let e = FeatureDistribution::Exponential { rate: 2.0 };
        for x in [0.0, 0.3, 1.7] {
            assert_relative_eq!(g.logpdf(x).unwrap(), e.logpdf(x).unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_student_t_cauchy_at_location() {
        let d = FeatureDistribution::StudentT { nu: 1.0, mu: 2.0, sigma: 1.0 };
        assert_relative_eq!(d.logpdf(2.0).unwrap(), -std::f64::consts::PI.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_support() {
        let d = FeatureDistribution::Uniform { low: -1.0, high: 3.0 };
        assert_relative_eq!(d.logpdf(0.0).unwrap(), -(4.0f64).ln(), epsilon = 1e-12);
        assert_eq!(d.logpdf(3.0).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(FeatureDistribution::Normal { mu: 0.0, sigma: 0.0 }.validate().is_err());
        assert!(FeatureDistribution::Exponential { rate: -1.0 }.validate().is_err());
        assert!(FeatureDistribution::Uniform { low: 1.0, high: 1.0 }.validate().is_err());
        assert!(FeatureDistribution::Gamma { shape: f64::NAN, scale: 1.0 }.logpdf(1.0).is_err());
    }

    #[test]
    fn test_sample_mean_close_to_analytic() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = FeatureDistribution::Gamma { shape: 2.0, scale: 1.5 };
        let xs = d.sample_n(20_000, &mut rng).unwrap();
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert!((mean - 3.0).abs() < 0.1, "mean={}", mean);
        assert!(xs.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_serde_tagged() {
        let d: FeatureDistribution =
            serde_json::from_str(r#"{"kind":"student_t","nu":4.0,"mu":0.0,"sigma":2.0}"#).unwrap();
        assert_eq!(d, FeatureDistribution::StudentT { nu: 4.0, mu: 0.0, sigma: 2.0 });
    }
}
