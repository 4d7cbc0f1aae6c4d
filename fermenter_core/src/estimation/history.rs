// fermenter_core/src/estimation/history.rs

use nalgebra::{DMatrix, DVector};

// --- Core Library Imports ---
use crate::error::EstimatorError;
use crate::estimation::ukf::UnscentedFilter;
use crate::inputs::InputProvider;
use crate::measurements::Assay;
use crate::state::FilterState;

/// One moment of the estimator's past, complete enough to restart the
/// filter from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Estimator clock when the snapshot was taken.
    pub time: f64,
    /// Filter mean at that time.
    pub mean: DVector<f64>,
    /// Filter covariance at that time.
    pub covariance: DMatrix<f64>,
    /// Per-state standard deviations, kept alongside for trend plots.
    pub deviations: DVector<f64>,
    /// The predict threshold that was armed at that time.
    pub next_predict: f64,
}

/// The filter wrapped in a clock, a predict schedule and a rewindable
/// history.
///
/// `step` advances the clock and lets the filter run ahead of it by one
/// predict interval at a time. Every step lands in the history, so a
/// laboratory result that arrives hours after its sample was drawn can be
/// applied at the draw time: the estimator rolls back to the snapshot at
/// or before that time, corrects there, and re-runs the erased steps with
/// the correction folded in.
#[derive(Debug, Clone)]
pub struct BioreactorEstimator {
    filter: UnscentedFilter,
    inputs: Box<dyn InputProvider>,
    history: Vec<Snapshot>,
    t: f64,
    next_predict: f64,
    predict_interval: f64,
}

impl BioreactorEstimator {
    /// Wraps a filter. The clock starts at the filter's timestamp with the
    /// predict threshold armed there, so the first step always predicts.
    pub fn new(
        filter: UnscentedFilter,
        inputs: Box<dyn InputProvider>,
        predict_interval: f64,
    ) -> Result<Self, EstimatorError> {
        if !predict_interval.is_finite() || predict_interval <= 0.0 {
            return Err(EstimatorError::InvalidTimeSpan {
                value: predict_interval,
            });
        }
        let t = filter.state().timestamp;
        let mut estimator = Self {
            filter,
            inputs,
            history: Vec::new(),
            t,
            next_predict: t,
            predict_interval,
        };
        estimator.push_snapshot();
        Ok(estimator)
    }

    /// Advances the clock by `dt` and snapshots the result. The filter
    /// predicts only when the clock passes the armed threshold; each
    /// predict runs one full interval ahead and the threshold advances by
    /// one interval, so predictions keep pace with the clock rather than
    /// with the stepping grid.
    pub fn step(&mut self, dt: f64) -> Result<(), EstimatorError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(EstimatorError::InvalidTimeSpan { value: dt });
        }
        self.t += dt;
        if self.t > self.next_predict {
            self.filter
                .predict(self.inputs.as_ref(), self.t, self.predict_interval)?;
            self.next_predict += self.predict_interval;
        }
        self.push_snapshot();
        Ok(())
    }

    /// Applies a laboratory result. A synchronous assay corrects at the
    /// current clock; a backdated one triggers a rollback to its sample
    /// time. The estimator state is untouched when an error comes back.
    pub fn update(&mut self, assay: &Assay) -> Result<(), EstimatorError> {
        assay.validate(self.filter.observation_dim())?;
        match assay.time {
            None => {
                self.filter.update(&assay.values)?;
                self.refresh_last_snapshot();
                Ok(())
            }
            Some(time) => self.update_backdated(time, &assay.values),
        }
    }

    fn update_backdated(
        &mut self,
        time: f64,
        values: &DVector<f64>,
    ) -> Result<(), EstimatorError> {
        if time > self.t {
            return Err(EstimatorError::MeasurementAhead {
                requested: time,
                current: self.t,
            });
        }
        let earliest = self.history[0].time;
        if time < earliest {
            return Err(EstimatorError::MeasurementTooOld {
                requested: time,
                earliest,
            });
        }

        // The last snapshot at or before the sample time anchors the
        // rollback; everything after it gets erased and re-run.
        let cut = self.history.partition_point(|s| s.time <= time) - 1;
        let replay: Vec<f64> = self.history[cut + 1..].iter().map(|s| s.time).collect();
        self.history.truncate(cut + 1);

        let anchor = &self.history[cut];
        self.t = anchor.time;
        self.next_predict = anchor.next_predict;
        self.filter
            .restore(anchor.mean.clone(), anchor.covariance.clone(), anchor.time);

        // Walk forward to the sample time, correct there, then re-run the
        // erased steps with the correction folded in. A zero-width walk is
        // skipped so snapshot times stay strictly increasing.
        let lead_in = time - self.t;
        if lead_in > 0.0 {
            self.step(lead_in)?;
        }
        self.filter.update(values)?;
        self.refresh_last_snapshot();
        for target in replay {
            self.step(target - self.t)?;
        }
        Ok(())
    }

    /// Rewrites the newest snapshot from the filter after a correction
    /// landing exactly on it, keeping "snapshot at or before t" rollbacks
    /// anchored to corrected states.
    fn refresh_last_snapshot(&mut self) {
        if let Some(last) = self.history.last_mut() {
            if last.time == self.t {
                let state = self.filter.state();
                last.mean = state.vector.clone();
                last.covariance = state.covariance.clone();
                last.deviations = state.deviations();
            }
        }
    }

    fn push_snapshot(&mut self) {
        let state = self.filter.state();
        self.history.push(Snapshot {
            time: self.t,
            mean: state.vector.clone(),
            covariance: state.covariance.clone(),
            deviations: state.deviations(),
            next_predict: self.next_predict,
        });
    }

    /// Current estimator clock.
    pub fn time(&self) -> f64 {
        self.t
    }

    /// Current filter estimate.
    pub fn state(&self) -> &FilterState {
        self.filter.state()
    }

    /// The period between filter predictions.
    pub fn predict_interval(&self) -> f64 {
        self.predict_interval
    }

    /// Every retained snapshot, oldest first.
    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    /// Snapshot times, oldest first.
    pub fn times(&self) -> Vec<f64> {
        self.history.iter().map(|s| s.time).collect()
    }

    /// Snapshot means as a matrix, one row per snapshot.
    pub fn means(&self) -> DMatrix<f64> {
        let cols = self.filter.state().dim();
        DMatrix::from_fn(self.history.len(), cols, |r, c| self.history[r].mean[c])
    }

    /// Snapshot standard deviations as a matrix, one row per snapshot.
    pub fn deviations(&self) -> DMatrix<f64> {
        let cols = self.filter.state().dim();
        DMatrix::from_fn(self.history.len(), cols, |r, c| {
            self.history[r].deviations[c]
        })
    }
}
