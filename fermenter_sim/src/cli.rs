// fermenter_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Fermenter: a fed-batch fumarate fermentation simulator and estimator.
///
/// Runs a scenario file end to end: the true broth, the scheduled lab
/// assays, and the unscented estimator tracking them.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "scenarios/fed_batch.toml")]
    pub scenario: PathBuf,

    /// Directory the result tables are written into.
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// Override the scenario's PRNG seed.
    #[arg(long)]
    pub seed: Option<u64>,
}
