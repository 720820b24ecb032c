//! Core traits for mcreweight
//!
//! Weight computation and diagnostics only need a probability per event, so
//! they depend on the `Classifier` trait rather than on a concrete network.

use crate::{Dataset, Error, Result};

/// Binary classifier that scores events as "MC-like".
///
/// `predict_proba` returns `P(label = MC | x)` in `[0, 1]`.
pub trait Classifier: Send + Sync {
    /// Number of input features expected by the classifier.
    fn n_features(&self) -> usize;

    /// Probability that a single feature vector belongs to the MC population.
    fn predict_proba(&self, features: &[f64]) -> Result<f64>;

    /// Score every sample of a dataset (in dataset order).
    fn predict_proba_dataset(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        if dataset.n_features() != self.n_features() {
            return Err(Error::Validation(format!(
                "classifier expects {} features, dataset has {}",
                self.n_features(),
                dataset.n_features()
            )));
        }
        dataset.samples().iter().map(|s| self.predict_proba(s.features())).collect()
    }
}
