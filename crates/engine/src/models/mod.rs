//! Regression models fitted over (date-ordinal, close) pairs

pub mod forest;
pub mod linear;

pub use forest::{ForestConfig, RandomForest};
pub use linear::LinearTrend;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("need at least {needed} samples, got {got}")]
    TooFewSamples { needed: usize, got: usize },

    #[error("feature and target lengths differ ({features} vs {targets})")]
    LengthMismatch { features: usize, targets: usize },

    #[error("input axis has zero variance")]
    Degenerate,

    #[error("non-finite value in training data")]
    NonFinite,

    #[error("invalid model configuration: {0}")]
    InvalidConfig(&'static str),
}

pub(crate) fn check_inputs(xs: &[f64], ys: &[f64], needed: usize) -> Result<(), FitError> {
    if xs.len() != ys.len() {
        return Err(FitError::LengthMismatch {
            features: xs.len(),
            targets: ys.len(),
        });
    }
    if xs.len() < needed {
        return Err(FitError::TooFewSamples {
            needed,
            got: xs.len(),
        });
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    Ok(())
}
