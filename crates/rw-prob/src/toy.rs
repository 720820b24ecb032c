//! Toy populations: independent latent features followed by a linear mixing.
//!
//! A population draws `z_j ~ f_j` independently and returns `x = A z`. A
//! non-diagonal `A` introduces correlations that single-variable reweighting
//! cannot correct. Because `A` is invertible, the density of `x` is known:
//!
//! `log p(x) = sum_j log f_j((A^-1 x)_j) - ln|det A|`

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rw_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::distributions::FeatureDistribution;

/// Smallest |det A| accepted for a mixing matrix.
const MIN_ABS_DET: f64 = 1e-12;

/// Generating recipe for one population (data or MC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    /// Latent per-feature distributions.
    pub features: Vec<FeatureDistribution>,
    /// Row-major square mixing matrix; identity when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixing: Option<Vec<Vec<f64>>>,
}

impl Population {
    /// Population with independent features (identity mixing).
    pub fn independent(features: Vec<FeatureDistribution>) -> Self {
        Self { features, mixing: None }
    }

    /// Attach a mixing matrix.
    pub fn with_mixing(mut self, mixing: Vec<Vec<f64>>) -> Self {
        self.mixing = Some(mixing);
        self
    }

    /// Number of observed features.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Mixing matrix as a dense matrix (identity when absent).
    pub fn mixing_matrix(&self) -> Result<DMatrix<f64>> {
        let n = self.features.len();
        let Some(rows) = &self.mixing else {
            return Ok(DMatrix::identity(n, n));
        };
        if rows.len() != n {
            return Err(Error::Validation(format!(
                "mixing matrix must be {}x{}, got {} rows",
                n,
                n,
                rows.len()
            )));
        }
        let mut flat = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(Error::Validation(format!(
                    "mixing matrix row {} has len {}, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(Error::Validation("mixing matrix must be finite".to_string()));
            }
            flat.extend_from_slice(row);
        }
        Ok(DMatrix::from_row_slice(n, n, &flat))
    }

    /// Validate distributions and mixing (square, finite, invertible).
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(Error::Validation("population must have at least 1 feature".to_string()));
        }
        for d in &self.features {
            d.validate()?;
        }
        let a = self.mixing_matrix()?;
        let det = a.determinant();
        if !det.is_finite() || det.abs() < MIN_ABS_DET {
            return Err(Error::Validation(format!(
                "mixing matrix must be invertible, det={}",
                det
            )));
        }
        Ok(())
    }

    /// Draw `n` events; each row is `A z`.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<Vec<f64>>> {
        self.validate()?;
        let a = self.mixing_matrix()?;
        let p = self.features.len();

        // Column-by-column so each latent feature consumes a contiguous RNG stream.
        let mut latent = Vec::with_capacity(p);
        for d in &self.features {
            latent.push(d.sample_n(n, rng)?);
        }

        let mut rows = Vec::with_capacity(n);
        let mut z = DVector::<f64>::zeros(p);
        for i in 0..n {
            for j in 0..p {
                z[j] = latent[j][i];
            }
            let x = &a * &z;
            rows.push(x.iter().copied().collect());
        }
        Ok(rows)
    }

    /// Exact log-density for each row.
    pub fn log_density(&self, rows: &[&[f64]]) -> Result<Vec<f64>> {
        self.validate()?;
        let a = self.mixing_matrix()?;
        let p = self.features.len();
        let log_abs_det = a.determinant().abs().ln();
        let a_inv = a
            .try_inverse()
            .ok_or_else(|| Error::Computation("mixing matrix inversion failed".to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != p {
                return Err(Error::Validation(format!(
                    "row {} has {} features, population has {}",
                    i,
                    row.len(),
                    p
                )));
            }
            let z = &a_inv * DVector::from_column_slice(row);
            let mut lp = -log_abs_det;
            for (d, &zj) in self.features.iter().zip(z.iter()) {
                lp += d.logpdf(zj)?;
            }
            out.push(lp);
        }
        Ok(out)
    }
}
