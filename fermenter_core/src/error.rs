// fermenter_core/src/error.rs

use crate::state::StateVar;
use thiserror::Error;

/// Failure modes of the estimation core.
///
/// Every variant is fatal to the operation that raised it. Recovery policy
/// (drop the measurement, widen retention, fix the scenario) belongs to the
/// calling driver, which is why the kinds stay distinguishable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    /// The covariance square root found an eigenvalue negative beyond
    /// numerical tolerance.
    #[error("covariance is not positive semi-definite (eigenvalue {eigenvalue:.3e})")]
    CovarianceNotPsd { eigenvalue: f64 },

    /// The innovation covariance could not be inverted during an update.
    #[error("innovation covariance is singular")]
    SingularInnovation,

    /// The stoichiometric rate system of the process model cannot be
    /// factored; the configured kinetic parameters are defective.
    #[error("stoichiometric rate matrix is singular")]
    SingularRateMatrix,

    /// Propagation or input sampling produced a NaN or infinity.
    #[error("non-finite value encountered in {context}")]
    NonFinite { context: &'static str },

    /// A vector had the wrong length for the operation.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A time span or interval was zero, negative, or non-finite where a
    /// positive one is required.
    #[error("invalid time span {value}")]
    InvalidTimeSpan { value: f64 },

    /// The state layout lacks a variable an observation model observes.
    #[error("state layout lacks {variable:?}")]
    LayoutMissing { variable: StateVar },

    /// A backdated measurement is older than the oldest retained snapshot,
    /// so there is nothing to roll back onto.
    #[error("measurement time {requested} precedes retained history (earliest {earliest})")]
    MeasurementTooOld { requested: f64, earliest: f64 },

    /// A measurement carries a sample time ahead of the estimator clock.
    #[error("measurement time {requested} is ahead of the estimator clock {current}")]
    MeasurementAhead { requested: f64, current: f64 },
}
