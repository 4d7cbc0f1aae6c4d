// fermenter_core/src/types.rs

use nalgebra::DVector;

// --- Core Type Aliases ---
pub type State = DVector<f64>;
pub type Observation = DVector<f64>;
