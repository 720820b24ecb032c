//! Per-feature standardization fitted on the training subset.

use rw_core::{Dataset, Error, Result};
use serde::{Deserialize, Serialize};

/// Affine map `z_j = (x_j - mean_j) / scale_j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    /// Fit means and standard deviations over all samples of `dataset`.
    ///
    /// Constant features get `scale = 1` so they pass through centred.
    pub fn fit(dataset: &Dataset) -> Self {
        let p = dataset.n_features();
        let n = dataset.len() as f64;
        let mut mean = vec![0.0; p];
        for s in dataset.samples() {
            for (m, &x) in mean.iter_mut().zip(s.features()) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; p];
        for s in dataset.samples() {
            for ((v, &m), &x) in var.iter_mut().zip(&mean).zip(s.features()) {
                *v += (x - m) * (x - m);
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let sd = (v / n).sqrt();
                if sd.is_finite() && sd > 0.0 { sd } else { 1.0 }
            })
            .collect();
        Self { mean, scale }
    }

    /// Identity transform for `p` features.
    pub fn identity(p: usize) -> Self {
        Self { mean: vec![0.0; p], scale: vec![1.0; p] }
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one feature vector into `out`.
    pub fn transform_into(&self, x: &[f64], out: &mut [f64]) -> Result<()> {
        if x.len() != self.mean.len() || out.len() != self.mean.len() {
            return Err(Error::Validation(format!(
                "standardizer expects {} features, got {}",
                self.mean.len(),
                x.len()
            )));
        }
        for j in 0..x.len() {
            out[j] = (x[j] - self.mean[j]) / self.scale[j];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rw_core::Label;

    #[test]
    fn test_fit_zero_mean_unit_variance() {
        let ds = Dataset::from_rows(vec![vec![1.0, 5.0], vec![3.0, 5.0], vec![5.0, 5.0]], Label::Data)
            .unwrap();
        let st = Standardizer::fit(&ds);
        let mut out = [0.0; 2];
        let mut zs = Vec::new();
        for s in ds.samples() {
            st.transform_into(s.features(), &mut out).unwrap();
            zs.push(out[0]);
            // constant column: centred, scale 1
            assert_eq!(out[1], 0.0);
        }
        let mean: f64 = zs.iter().sum::<f64>() / 3.0;
        let var: f64 = zs.iter().map(|z| z * z).sum::<f64>() / 3.0;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let st = Standardizer::identity(2);
        let mut out = [0.0; 2];
        assert!(st.transform_into(&[1.0], &mut out).is_err());
    }
}
