//! Dataset assembly: labelling, shuffling and the train/test split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rw_core::{Dataset, Error, Label, Result};

/// Disjoint train/test halves of a shuffled dataset.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    /// Training subset (classifier fit + standardizer statistics).
    pub train: Dataset,
    /// Held-out subset (scoring, weights, diagnostics).
    pub test: Dataset,
}

/// Label data rows `0` and MC rows `1`, and concatenate (data first).
pub fn assemble(data: Vec<Vec<f64>>, mc: Vec<Vec<f64>>) -> Result<Dataset> {
    let data = Dataset::from_rows(data, Label::Data)?;
    let mc = Dataset::from_rows(mc, Label::Mc)?;
    data.concat(mc)
}

/// Shuffle with `StdRng::seed_from_u64(seed)` and split at `round(n * train_fraction)`.
///
/// Deterministic for a given seed. Both halves must be non-empty.
pub fn shuffle_split(dataset: Dataset, train_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(Error::Validation(format!(
            "train_fraction must be in (0, 1), got {}",
            train_fraction
        )));
    }
    let n = dataset.len();
    let n_train = (n as f64 * train_fraction).round() as usize;
    if n_train == 0 || n_train >= n {
        return Err(Error::Validation(format!(
            "split of {} samples at fraction {} leaves an empty subset",
            n, train_fraction
        )));
    }

    let mut samples = dataset.into_samples();
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);
    let test_samples = samples.split_off(n_train);

    let train = Dataset::new(samples)?;
    let test = Dataset::new(test_samples)?;
    tracing::debug!(
        n_train = train.len(),
        n_test = test.len(),
        train_mc = train.count(Label::Mc),
        test_mc = test.count(Label::Mc),
        "dataset split"
    );
    Ok(TrainTestSplit { train, test })
}
