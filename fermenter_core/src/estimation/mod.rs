// fermenter_core/src/estimation/mod.rs

pub mod history;
pub mod sigma;
pub mod ukf;
