//! # rw-core
//!
//! Core types, traits, and error handling for mcreweight.
//!
//! This crate provides:
//! - Common error types
//! - Labelled samples and datasets shared by every pipeline stage
//! - The `Classifier` seam between training and weight computation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::Classifier;
pub use types::{Dataset, Label, Sample};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
