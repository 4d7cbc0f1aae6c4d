// fermenter_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::inputs::InputProvider;
pub use crate::measurements::MeasurementSource;
pub use crate::models::assay::ObservationModel;
pub use crate::models::ProcessModel;
pub use crate::utils::integrators::Integrator;

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::context::RunContext;
pub use crate::error::EstimatorError;
pub use crate::inputs::{ConstantInputs, FeedStreams};
pub use crate::measurements::Assay;
pub use crate::state::{FilterState, StateVar};
pub use crate::types::{Observation, State};

// --- Estimation Algorithms ---
pub use crate::estimation::history::{BioreactorEstimator, Snapshot};
pub use crate::estimation::sigma::{MerweScaling, SigmaPoints};
pub use crate::estimation::ukf::UnscentedFilter;

// --- Concrete Model Implementations (Export common ones for convenience) ---
pub use crate::models::assay::ConcentrationAssay;
pub use crate::models::fumaric::{state_layout, FumaricKinetics, FumaricParams, STATE_DIM};
pub use crate::utils::integrators::Euler;
