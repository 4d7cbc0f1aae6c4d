// fermenter_core/src/state.rs

use nalgebra::{DMatrix, DVector};

/// Every variable that can appear in a bioreactor state vector.
///
/// All species entries are holdups, absolute molar quantities in the liquid
/// or gas phase, never concentrations. Concentrations are recovered by
/// dividing by the matching volume entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateVar {
    /// Substrate (glucose) holdup, mol.
    Glucose,
    /// Cell holdup, mol.
    Biomass,
    /// Organic-acid product (fumarate) holdup, mol.
    Fumarate,
    /// Ethanol by-product holdup, mol.
    Ethanol,
    /// Headspace CO2 holdup, mol.
    GasCo2,
    /// Headspace O2 holdup, mol.
    GasO2,
    /// Nitrogen-source holdup, mol.
    Nitrogen,
    /// Acid titrant holdup, mol.
    Acid,
    /// Base titrant holdup, mol.
    Base,
    /// Regulatory pool gating the ethanol pathway down, mol.
    RegulatorZ,
    /// Regulatory pool gating the ethanol pathway up, mol.
    RegulatorY,
    /// Broth volume, L.
    LiquidVolume,
    /// Headspace volume, L.
    GasVolume,
    /// Broth temperature, degrees C.
    Temperature,
}

impl StateVar {
    /// Whether the variable is floored at zero during rate evaluation.
    /// Temperature is the only signed quantity in the shipped layouts.
    pub fn is_nonnegative(self) -> bool {
        !matches!(self, StateVar::Temperature)
    }

    /// Compact column label used in logs and trajectory exports.
    pub fn short_name(self) -> &'static str {
        match self {
            StateVar::Glucose => "Ng",
            StateVar::Biomass => "Nx",
            StateVar::Fumarate => "Nfa",
            StateVar::Ethanol => "Ne",
            StateVar::GasCo2 => "Nco",
            StateVar::GasO2 => "No",
            StateVar::Nitrogen => "Nn",
            StateVar::Acid => "Na",
            StateVar::Base => "Nb",
            StateVar::RegulatorZ => "Nz",
            StateVar::RegulatorY => "Ny",
            StateVar::LiquidVolume => "V",
            StateVar::GasVolume => "Vg",
            StateVar::Temperature => "T",
        }
    }
}

/// The bundle a filter carries: the state vector with its schema, the
/// covariance, and the time the pair was last touched.
#[derive(Debug, Clone)]
pub struct FilterState {
    /// The ordered schema of the state vector.
    pub layout: Vec<StateVar>,
    /// The numerical state vector `x`.
    pub vector: DVector<f64>,
    /// The covariance matrix `P`.
    pub covariance: DMatrix<f64>,
    /// Estimator clock at the last predict, restore or construction.
    pub timestamp: f64,
}

impl FilterState {
    /// Builds an uncertainty-free state, `P = 0`, for a known initial
    /// charge. This is how runs start: the operator weighed the charge in.
    pub fn certain(layout: Vec<StateVar>, x0: DVector<f64>, timestamp: f64) -> Self {
        let dim = layout.len();
        Self {
            layout,
            vector: x0,
            covariance: DMatrix::zeros(dim, dim),
            timestamp,
        }
    }

    /// Dimension of the state vector.
    pub fn dim(&self) -> usize {
        self.layout.len()
    }

    /// Position of a variable in the layout.
    pub fn index_of(&self, var: StateVar) -> Option<usize> {
        self.layout.iter().position(|v| *v == var)
    }

    /// Current value of a variable, if the layout carries it.
    pub fn value_of(&self, var: StateVar) -> Option<f64> {
        self.index_of(var).map(|i| self.vector[i])
    }

    /// Per-state standard deviations, the square roots of the covariance
    /// diagonal. Tiny negative diagonal entries from roundoff read as zero.
    pub fn deviations(&self) -> DVector<f64> {
        self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
    }
}
