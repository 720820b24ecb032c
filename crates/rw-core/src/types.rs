//! Common data types for mcreweight

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Origin of an event.
///
/// Encoded as `0` (data) and `1` (MC) on the wire and as the classifier target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    /// Observed (reference) population
    Data,
    /// Simulated population to be corrected
    Mc,
}

impl Label {
    /// Classifier target value (`0.0` for data, `1.0` for MC).
    #[inline]
    pub fn target(self) -> f64 {
        match self {
            Label::Data => 0.0,
            Label::Mc => 1.0,
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        match label {
            Label::Data => 0,
            Label::Mc => 1,
        }
    }
}

impl TryFrom<u8> for Label {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Label::Data),
            1 => Ok(Label::Mc),
            other => Err(Error::Validation(format!("label must be 0 or 1, got {}", other))),
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Data => write!(f, "data"),
            Label::Mc => write!(f, "mc"),
        }
    }
}

/// One event: a feature vector plus its origin label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    features: Vec<f64>,
    label: Label,
}

impl Sample {
    /// Create a new sample.
    pub fn new(features: Vec<f64>, label: Label) -> Self {
        Self { features, label }
    }

    /// Feature values.
    #[inline]
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// Origin label.
    #[inline]
    pub fn label(&self) -> Label {
        self.label
    }
}

/// A non-empty collection of samples sharing one feature dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    n_features: usize,
    samples: Vec<Sample>,
}

impl Dataset {
    /// Build a dataset, validating dimensionality and finiteness.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        let n_features = samples
            .first()
            .map(|s| s.features.len())
            .ok_or_else(|| Error::Validation("dataset must contain at least one sample".to_string()))?;
        if n_features == 0 {
            return Err(Error::Validation("samples must have at least 1 feature".to_string()));
        }
        for (i, s) in samples.iter().enumerate() {
            if s.features.len() != n_features {
                return Err(Error::Validation(format!(
                    "inconsistent feature dimensionality: sample {} has {}, expected {}",
                    i,
                    s.features.len(),
                    n_features
                )));
            }
            if s.features.iter().any(|v| !v.is_finite()) {
                return Err(Error::Validation(format!("sample {} contains non-finite features", i)));
            }
        }
        Ok(Self { n_features, samples })
    }

    /// Label every row with `label` and build a dataset.
    pub fn from_rows(rows: Vec<Vec<f64>>, label: Label) -> Result<Self> {
        Self::new(rows.into_iter().map(|r| Sample::new(r, label)).collect())
    }

    /// Concatenate two datasets of equal dimensionality (order preserved).
    pub fn concat(mut self, other: Dataset) -> Result<Self> {
        if self.n_features != other.n_features {
            return Err(Error::Validation(format!(
                "cannot concatenate datasets with {} and {} features",
                self.n_features, other.n_features
            )));
        }
        self.samples.extend(other.samples);
        Ok(self)
    }

    /// Feature dimensionality.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false: datasets are non-empty by construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples in order.
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Consume into the sample vector.
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Number of samples with the given label.
    pub fn count(&self, label: Label) -> usize {
        self.samples.iter().filter(|s| s.label == label).count()
    }

    /// Feature rows of samples with the given label (may be empty).
    pub fn rows_with_label(&self, label: Label) -> Vec<&[f64]> {
        self.samples.iter().filter(|s| s.label == label).map(|s| s.features()).collect()
    }

    /// Classifier targets (`0.0` / `1.0`) in dataset order.
    pub fn targets(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label.target()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip_u8() {
        assert_eq!(Label::try_from(0u8).unwrap(), Label::Data);
        assert_eq!(Label::try_from(1u8).unwrap(), Label::Mc);
        assert!(Label::try_from(2u8).is_err());
        assert_eq!(u8::from(Label::Mc), 1);
    }

    #[test]
    fn test_label_serde_as_integer() {
        let s = Sample::new(vec![0.5], Label::Mc);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#"{"features":[0.5],"label":1}"#);
        assert!(serde_json::from_str::<Sample>(r#"{"features":[0.5],"label":3}"#).is_err());
    }

    #[test]
    fn test_dataset_rejects_inconsistent_dims() {
        let r = Dataset::new(vec![
            Sample::new(vec![1.0, 2.0], Label::Data),
            Sample::new(vec![1.0], Label::Mc),
        ]);
        assert!(r.is_err());
    }

    #[test]
    fn test_dataset_rejects_empty_and_non_finite() {
        assert!(Dataset::new(vec![]).is_err());
        assert!(Dataset::new(vec![Sample::new(vec![], Label::Data)]).is_err());
        assert!(Dataset::new(vec![Sample::new(vec![f64::NAN], Label::Data)]).is_err());
    }

    #[test]
    fn test_concat_and_counts() {
        let a = Dataset::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], Label::Data).unwrap();
        let b = Dataset::from_rows(vec![vec![5.0, 6.0]], Label::Mc).unwrap();
        let ds = a.concat(b).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.count(Label::Data), 2);
        assert_eq!(ds.count(Label::Mc), 1);
        assert_eq!(ds.targets(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_concat_dimension_mismatch() {
        let a = Dataset::from_rows(vec![vec![1.0, 2.0]], Label::Data).unwrap();
        let b = Dataset::from_rows(vec![vec![5.0]], Label::Mc).unwrap();
        assert!(a.concat(b).is_err());
    }
}
