// fermenter_sim/src/runner.rs

use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nalgebra::{DMatrix, DVector};

use crate::assays::ScheduledAssays;
use crate::config::ScenarioConfig;
use crate::prng::SimulationRng;
use crate::schedule::BatchFeedSchedule;
use fermenter_core::models::fumaric::{state_layout, FumaricKinetics};
use fermenter_core::prelude::{
    BioreactorEstimator, ConcentrationAssay, Euler, EstimatorError, FilterState, ProcessModel,
    RunContext, State, StateVar, UnscentedFilter,
};

/// Runs a scenario end to end and writes the result tables into `out_dir`.
///
/// Two passes: first the true broth is integrated over the whole horizon
/// and the lab draws are taken from it, then the estimator runs against
/// the same feed schedule with only those assays to correct it.
pub fn run(config: &ScenarioConfig, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let layout = state_layout();
    let dt = config.run.step_hours;
    let steps = (config.run.duration_hours / dt).round() as usize;

    // --- Pass 1: the true broth ---
    log::info!(
        "simulating {:.0} h of broth at {:.2} h steps",
        config.run.duration_hours,
        dt
    );
    let (times, states) = simulate_truth(config)?;

    // --- The offline lab ---
    let mut rng = SimulationRng::new(config.run.seed);
    let source = ScheduledAssays::sample_truth(&times, &states, &layout, &config.assays, &mut rng);
    let queued = source.queued().count();
    log::info!(
        "queued {} lab assays ({} h turnaround)",
        queued,
        config.assays.delay_hours
    );

    fs::create_dir_all(out_dir)?;
    let columns: Vec<&str> = layout.iter().map(|var| var.short_name()).collect();
    write_table(&out_dir.join("truth.csv"), &columns, &times, |k, j| {
        states[k][j]
    })?;
    write_assays(&out_dir.join("assays.csv"), config, &source)?;

    // --- Pass 2: the estimator ---
    let noise_std: [f64; 3] = config
        .assays
        .noise_std
        .as_slice()
        .try_into()
        .map_err(|_| "assays.noise_std needs one entry per channel (glucose, fumarate, ethanol)")?;
    let noise_var = [
        noise_std[0].powi(2),
        noise_std[1].powi(2),
        noise_std[2].powi(2),
    ];
    let observation = ConcentrationAssay::new(&layout, &noise_var)?;
    let model = FumaricKinetics::new(config.kinetics)?;
    let process_noise = DMatrix::from_diagonal(&DVector::from_vec(
        config.estimator.process_noise.clone(),
    ));
    let filter = UnscentedFilter::new(
        FilterState::certain(layout.clone(), config.reactor.initial_state(), 0.0),
        process_noise,
        config.estimator.scaling,
        Box::new(model),
        Box::new(observation),
    )?;
    let estimator = BioreactorEstimator::new(
        filter,
        Box::new(BatchFeedSchedule::new(config.feed.clone())),
        config.estimator.predict_interval,
    )?;
    let mut ctx = RunContext::new(estimator, Box::new(source));

    log::info!("running the estimator over {} steps", steps);
    let glucose = position(&layout, StateVar::Glucose);
    let volume = position(&layout, StateVar::LiquidVolume);
    for k in 1..=steps {
        ctx.advance(dt)?;
        if k % 80 == 0 {
            let state = ctx.estimator().state();
            log::debug!(
                "t = {:7.2} h estimate Cg = {:.5} mol/L (true {:.5})",
                ctx.time(),
                state.vector[glucose] / state.vector[volume],
                states[k][glucose] / states[k][volume]
            );
        }
    }

    let est_times = ctx.estimator().times();
    let means = ctx.estimator().means();
    let deviations = ctx.estimator().deviations();
    write_table(&out_dir.join("estimates.csv"), &columns, &est_times, |k, j| {
        means[(k, j)]
    })?;
    write_table(
        &out_dir.join("deviations.csv"),
        &columns,
        &est_times,
        |k, j| deviations[(k, j)],
    )?;
    log::info!(
        "wrote {} truth and {} estimate rows to {}",
        times.len(),
        est_times.len(),
        out_dir.display()
    );
    Ok(())
}

/// Integrates the true broth over the run, flushing the spent batch medium
/// once if the scenario asks for it.
pub(crate) fn simulate_truth(
    config: &ScenarioConfig,
) -> Result<(Vec<f64>, Vec<State>), EstimatorError> {
    let layout = state_layout();
    let model = FumaricKinetics::new(config.kinetics)?;
    let schedule = BatchFeedSchedule::new(config.feed.clone());
    let dt = config.run.step_hours;
    let steps = (config.run.duration_hours / dt).round() as usize;

    // Everything dissolved or gaseous goes out with the flush; the culture
    // and the broth itself stay.
    let soluble = [
        StateVar::Glucose,
        StateVar::Fumarate,
        StateVar::Ethanol,
        StateVar::GasCo2,
        StateVar::GasO2,
        StateVar::Nitrogen,
    ];

    let mut x = config.reactor.initial_state();
    let mut times = vec![0.0];
    let mut states = vec![x.clone()];
    let mut flushed = config.reactor.flush_hour.is_none();
    for k in 1..=steps {
        let t_prev = (k - 1) as f64 * dt;
        let t = k as f64 * dt;
        x = model.propagate(&x, &schedule, t_prev, dt, &Euler)?;
        if !flushed {
            if let Some(hour) = config.reactor.flush_hour {
                if t > hour {
                    for var in soluble {
                        x[position(&layout, var)] = 0.0;
                    }
                    flushed = true;
                    log::info!("flushed the spent batch medium at {:.2} h", t);
                }
            }
        }
        times.push(t);
        states.push(x.clone());
    }
    Ok((times, states))
}

fn position(layout: &[StateVar], var: StateVar) -> usize {
    layout
        .iter()
        .position(|v| *v == var)
        .expect("canonical layout is missing a variable")
}

fn write_table<F>(path: &Path, columns: &[&str], times: &[f64], value: F) -> io::Result<()>
where
    F: Fn(usize, usize) -> f64,
{
    let mut file = BufWriter::new(File::create(path)?);
    write!(file, "t")?;
    for column in columns {
        write!(file, ",{}", column)?;
    }
    writeln!(file)?;
    for (k, t) in times.iter().enumerate() {
        write!(file, "{}", t)?;
        for j in 0..columns.len() {
            write!(file, ",{}", value(k, j))?;
        }
        writeln!(file)?;
    }
    file.flush()
}

fn write_assays(path: &Path, config: &ScenarioConfig, source: &ScheduledAssays) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "t,Cg,Cfa,Ce")?;
    for (release, assay) in source.queued() {
        let drawn = assay
            .time
            .unwrap_or(release - config.assays.delay_hours);
        writeln!(
            file,
            "{},{},{},{}",
            drawn, assay.values[0], assay.values[1], assay.values[2]
        )?;
    }
    file.flush()
}
