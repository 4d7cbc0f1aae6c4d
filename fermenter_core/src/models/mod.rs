// fermenter_core/src/models/mod.rs

pub mod assay;
pub mod fumaric;

use crate::error::EstimatorError;
use crate::inputs::{FeedStreams, InputProvider};
use crate::state::StateVar;
use crate::types::State;
use crate::utils::integrators::Integrator;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// Continuous-time reactor kinetics over a declared state layout.
pub trait ProcessModel: DynClone + Debug + Send + Sync {
    /// The ordered schema of the state vector this model advances.
    fn layout(&self) -> &[StateVar];

    /// Dimension of the state vector.
    fn dim(&self) -> usize {
        self.layout().len()
    }

    /// Time derivative of the state under the given streams.
    ///
    /// Implementations read holdups through a floored-at-zero view when
    /// evaluating rates, but must never clamp the carried vector itself:
    /// the returned derivative is applied to `x` exactly as handed in.
    fn derivatives(&self, x: &State, streams: &FeedStreams, t: f64) -> State;

    /// Advances `x` from `t` over `dt`, re-sampling the inputs at the start
    /// of every sub-step.
    ///
    /// The sub-step count is `round(dt * 5) + 2` and the grid tiles
    /// `[t, t + dt]` exactly, so repeated spans land on exact boundaries.
    fn propagate(
        &self,
        x: &State,
        inputs: &dyn InputProvider,
        t: f64,
        dt: f64,
        integrator: &dyn Integrator<f64>,
    ) -> Result<State, EstimatorError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(EstimatorError::InvalidTimeSpan { value: dt });
        }
        if x.len() != self.dim() {
            return Err(EstimatorError::DimensionMismatch {
                expected: self.dim(),
                actual: x.len(),
            });
        }
        if dt == 0.0 {
            return Ok(x.clone());
        }

        let count = (dt * 5.0).round() as usize + 2;
        let mut state = x.clone();
        let mut t_lo = t;
        for i in 0..count {
            let t_hi = t + dt * ((i + 1) as f64 / count as f64);
            let streams = inputs.sample(t_lo);
            if !streams.is_finite() {
                return Err(EstimatorError::NonFinite {
                    context: "input streams",
                });
            }
            let rate = |x: &State, ti: f64| self.derivatives(x, &streams, ti);
            state = integrator.step(&rate, &state, t_lo, t_hi);
            if !state.iter().all(|v| v.is_finite()) {
                return Err(EstimatorError::NonFinite {
                    context: "propagated state",
                });
            }
            t_lo = t_hi;
        }
        Ok(state)
    }
}

dyn_clone::clone_trait_object!(ProcessModel);
