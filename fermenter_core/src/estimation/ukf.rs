// fermenter_core/src/estimation/ukf.rs

use nalgebra::{DMatrix, DVector};

// --- Core Library Imports ---
use crate::error::EstimatorError;
use crate::estimation::sigma::{MerweScaling, SigmaPoints};
use crate::inputs::InputProvider;
use crate::models::assay::ObservationModel;
use crate::models::ProcessModel;
use crate::state::FilterState;
use crate::types::Observation;
use crate::utils::integrators::Euler;

/// Unscented Kalman filter over a nonlinear process and observation pair.
///
/// The filter owns its models. Process noise is added once per predict
/// regardless of the propagation span; measurement noise lives on the
/// observation model. Every numerical failure surfaces as an error and
/// leaves no half-applied arithmetic behind the caller's back.
#[derive(Debug, Clone)]
pub struct UnscentedFilter {
    state: FilterState,
    process_noise: DMatrix<f64>,
    scaling: MerweScaling,
    process: Box<dyn ProcessModel>,
    observation: Box<dyn ObservationModel>,
}

impl UnscentedFilter {
    /// Builds a filter and checks every shape against the state layout up
    /// front, so the stepping paths never see a mismatch.
    pub fn new(
        state: FilterState,
        process_noise: DMatrix<f64>,
        scaling: MerweScaling,
        process: Box<dyn ProcessModel>,
        observation: Box<dyn ObservationModel>,
    ) -> Result<Self, EstimatorError> {
        let n = state.dim();
        if state.vector.len() != n {
            return Err(EstimatorError::DimensionMismatch {
                expected: n,
                actual: state.vector.len(),
            });
        }
        if state.covariance.nrows() != n || state.covariance.ncols() != n {
            return Err(EstimatorError::DimensionMismatch {
                expected: n,
                actual: state.covariance.nrows(),
            });
        }
        if process_noise.nrows() != n || process_noise.ncols() != n {
            return Err(EstimatorError::DimensionMismatch {
                expected: n,
                actual: process_noise.nrows(),
            });
        }
        if process.dim() != n {
            return Err(EstimatorError::DimensionMismatch {
                expected: n,
                actual: process.dim(),
            });
        }
        let m = observation.dim();
        if observation.noise().nrows() != m || observation.noise().ncols() != m {
            return Err(EstimatorError::DimensionMismatch {
                expected: m,
                actual: observation.noise().nrows(),
            });
        }
        Ok(Self {
            state,
            process_noise,
            scaling,
            process,
            observation,
        })
    }

    /// The current estimate.
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Number of channels the observation model produces.
    pub fn observation_dim(&self) -> usize {
        self.observation.dim()
    }

    /// Overwrites the carried estimate. Only the history layer calls this,
    /// as part of a rollback.
    pub(crate) fn restore(
        &mut self,
        vector: DVector<f64>,
        covariance: DMatrix<f64>,
        timestamp: f64,
    ) {
        self.state.vector = vector;
        self.state.covariance = covariance;
        self.state.timestamp = timestamp;
    }

    /// Propagates the estimate from `t` over `span`.
    ///
    /// Each sigma point runs through the full sub-stepped integration, so
    /// the points see the same feed schedule the mean does. The carried
    /// points are recombined exactly as generated; excursions are never
    /// clamped between generation and recombination.
    pub fn predict(
        &mut self,
        inputs: &dyn InputProvider,
        t: f64,
        span: f64,
    ) -> Result<(), EstimatorError> {
        let n = self.state.dim();
        let sigmas =
            SigmaPoints::generate(&self.state.vector, &self.state.covariance, &self.scaling)?;

        let mut propagated = DMatrix::zeros(n, sigmas.count());
        for i in 0..sigmas.count() {
            let point = sigmas.points.column(i).into_owned();
            let advanced = self.process.propagate(&point, inputs, t, span, &Euler)?;
            propagated.column_mut(i).copy_from(&advanced);
        }

        let x_pred = &propagated * &sigmas.weights_m;
        let mut p_pred = DMatrix::zeros(n, n);
        for i in 0..sigmas.count() {
            let diff = propagated.column(i) - &x_pred;
            p_pred += sigmas.weights_c[i] * &diff * diff.transpose();
        }
        p_pred += &self.process_noise;

        self.state.vector = x_pred;
        // Roundoff makes P drift off symmetric; force it back.
        self.state.covariance = (&p_pred + p_pred.transpose()) * 0.5;
        self.state.timestamp = t;
        Ok(())
    }

    /// Folds a measurement into the estimate at the current time.
    pub fn update(&mut self, z: &Observation) -> Result<(), EstimatorError> {
        let m = self.observation.dim();
        if z.len() != m {
            return Err(EstimatorError::DimensionMismatch {
                expected: m,
                actual: z.len(),
            });
        }
        if !z.iter().all(|v| v.is_finite()) {
            return Err(EstimatorError::NonFinite {
                context: "measurement",
            });
        }

        let n = self.state.dim();
        let sigmas =
            SigmaPoints::generate(&self.state.vector, &self.state.covariance, &self.scaling)?;

        let mut observed = DMatrix::zeros(m, sigmas.count());
        for i in 0..sigmas.count() {
            let point = sigmas.points.column(i).into_owned();
            observed
                .column_mut(i)
                .copy_from(&self.observation.predict(&point));
        }

        let z_pred = &observed * &sigmas.weights_m;
        let mut s_cov = DMatrix::zeros(m, m);
        for i in 0..sigmas.count() {
            let diff = observed.column(i) - &z_pred;
            s_cov += sigmas.weights_c[i] * &diff * diff.transpose();
        }
        s_cov += self.observation.noise();

        let mut cross = DMatrix::zeros(n, m);
        for i in 0..sigmas.count() {
            let diff_x = sigmas.points.column(i) - &self.state.vector;
            let diff_z = observed.column(i) - &z_pred;
            cross += sigmas.weights_c[i] * &diff_x * diff_z.transpose();
        }

        let s_inv = s_cov
            .clone()
            .try_inverse()
            .ok_or(EstimatorError::SingularInnovation)?;
        let gain = cross * s_inv;

        self.state.vector += &gain * (z - &z_pred);
        self.state.covariance -= &gain * &s_cov * gain.transpose();
        self.state.covariance =
            (&self.state.covariance + self.state.covariance.transpose()) * 0.5;
        Ok(())
    }
}
