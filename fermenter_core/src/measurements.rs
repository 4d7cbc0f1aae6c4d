// fermenter_core/src/measurements.rs

use crate::error::EstimatorError;
use nalgebra::DVector;
use std::fmt::Debug;

/// One laboratory result ready to be folded into the estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Assay {
    /// When the sample was drawn. `None` means "now": the result applies
    /// at the estimator's current time. `Some(t)` marks a backdated result
    /// whose analysis finished well after the draw.
    pub time: Option<f64>,
    /// The measured values, one entry per observed channel.
    pub values: DVector<f64>,
}

impl Assay {
    /// A result that applies at the estimator's current time.
    pub fn synchronous(values: DVector<f64>) -> Self {
        Self { time: None, values }
    }

    /// A result whose sample was drawn at `time`, before now.
    pub fn backdated(time: f64, values: DVector<f64>) -> Self {
        Self {
            time: Some(time),
            values,
        }
    }

    /// Rejects assays that cannot be applied: wrong channel count or
    /// non-finite content.
    pub fn validate(&self, expected_len: usize) -> Result<(), EstimatorError> {
        if self.values.len() != expected_len {
            return Err(EstimatorError::DimensionMismatch {
                expected: expected_len,
                actual: self.values.len(),
            });
        }
        if !self.values.iter().all(|v| v.is_finite()) {
            return Err(EstimatorError::NonFinite {
                context: "assay values",
            });
        }
        if let Some(t) = self.time {
            if !t.is_finite() {
                return Err(EstimatorError::NonFinite {
                    context: "assay timestamp",
                });
            }
        }
        Ok(())
    }
}

/// Feed of laboratory results. Polled after every estimator step; whatever
/// has arrived by time `t` is handed over exactly once.
pub trait MeasurementSource: Debug + Send + Sync {
    /// Results that have arrived by time `t` and were not delivered before.
    fn poll(&mut self, t: f64) -> Vec<Assay>;
}
