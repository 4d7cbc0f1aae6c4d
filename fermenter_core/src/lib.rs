// fermenter_core/src/lib.rs

// Public modules of the estimation library.
pub mod context;
pub mod error;
pub mod estimation;
pub mod inputs;
pub mod measurements;
pub mod models;
pub mod prelude;
pub mod state;
pub mod types;
pub mod utils;
