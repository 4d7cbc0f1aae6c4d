// fermenter_sim/src/main.rs

mod assays;
mod cli;
mod config;
mod prng;
mod runner;
mod schedule;

use clap::Parser;
use figment::{
    providers::{Format, Toml},
    Figment,
};

use cli::Cli;
use config::ScenarioConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    log::info!("loading scenario from {}", cli.scenario.display());
    let mut config: ScenarioConfig = match Figment::new().merge(Toml::file(&cli.scenario)).extract()
    {
        Ok(config) => config,
        Err(e) => {
            log::error!(
                "failed to load or parse scenario file at {}: {}",
                cli.scenario.display(),
                e
            );
            std::process::exit(1);
        }
    };
    if let Some(seed) = cli.seed {
        config.run.seed = Some(seed);
    }

    if let Err(e) = runner::run(&config, &cli.output) {
        log::error!("run failed: {}", e);
        std::process::exit(1);
    }
}
