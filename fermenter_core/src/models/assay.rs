// fermenter_core/src/models/assay.rs

use crate::error::EstimatorError;
use crate::state::StateVar;
use crate::types::{Observation, State};
use dyn_clone::DynClone;
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

/// Maps a state vector into measurement space and carries the noise of
/// that measurement.
pub trait ObservationModel: DynClone + Debug + Send + Sync {
    /// Number of observed channels.
    fn dim(&self) -> usize;

    /// The expected measurement for state `x`.
    ///
    /// Must stay well defined for sigma points with small negative
    /// excursions; no flooring of the state on the way through.
    fn predict(&self, x: &State) -> Observation;

    /// Measurement noise covariance, `dim` by `dim`.
    fn noise(&self) -> &DMatrix<f64>;
}

dyn_clone::clone_trait_object!(ObservationModel);

/// The offline broth assay: glucose, fumarate and ethanol concentrations,
/// each a holdup divided by the liquid volume.
#[derive(Debug, Clone)]
pub struct ConcentrationAssay {
    glucose: usize,
    fumarate: usize,
    ethanol: usize,
    volume: usize,
    noise: DMatrix<f64>,
}

impl ConcentrationAssay {
    /// Resolves the observed variables against `layout` once, so the hot
    /// path is plain indexing.
    pub fn new(layout: &[StateVar], noise_diag: &[f64; 3]) -> Result<Self, EstimatorError> {
        let position = |var: StateVar| {
            layout
                .iter()
                .position(|v| *v == var)
                .ok_or(EstimatorError::LayoutMissing { variable: var })
        };
        Ok(Self {
            glucose: position(StateVar::Glucose)?,
            fumarate: position(StateVar::Fumarate)?,
            ethanol: position(StateVar::Ethanol)?,
            volume: position(StateVar::LiquidVolume)?,
            noise: DMatrix::from_diagonal(&DVector::from_row_slice(noise_diag)),
        })
    }
}

impl ObservationModel for ConcentrationAssay {
    fn dim(&self) -> usize {
        3
    }

    fn predict(&self, x: &State) -> Observation {
        let v = x[self.volume];
        Observation::from_vec(vec![
            x[self.glucose] / v,
            x[self.fumarate] / v,
            x[self.ethanol] / v,
        ])
    }

    fn noise(&self) -> &DMatrix<f64> {
        &self.noise
    }
}
