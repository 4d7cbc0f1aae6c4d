// fermenter_core/src/context.rs

use crate::error::EstimatorError;
use crate::estimation::history::BioreactorEstimator;
use crate::measurements::MeasurementSource;

// Owns the estimator together with the source feeding it, so a driver
// holds exactly one handle for the whole run.
#[derive(Debug)]
pub struct RunContext {
    estimator: BioreactorEstimator,
    measurements: Box<dyn MeasurementSource>,
}

impl RunContext {
    pub fn new(
        estimator: BioreactorEstimator,
        measurements: Box<dyn MeasurementSource>,
    ) -> Self {
        Self {
            estimator,
            measurements,
        }
    }

    /// Advances the clock by `dt`, then applies every assay the source has
    /// ready at the new time. Backdated assays rewind the estimator on
    /// their own, so only arrival order matters here.
    pub fn advance(&mut self, dt: f64) -> Result<(), EstimatorError> {
        self.estimator.step(dt)?;
        let t = self.estimator.time();
        for assay in self.measurements.poll(t) {
            self.estimator.update(&assay)?;
        }
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.estimator.time()
    }

    pub fn estimator(&self) -> &BioreactorEstimator {
        &self.estimator
    }
}
