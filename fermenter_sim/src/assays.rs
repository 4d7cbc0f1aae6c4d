// fermenter_sim/src/assays.rs

use std::collections::VecDeque;

use nalgebra::DVector;
use rand_distr::{Distribution, Normal};

use crate::config::AssaySettings;
use crate::prng::SimulationRng;
use fermenter_core::prelude::{Assay, MeasurementSource, State, StateVar};

/// One lab result on its way back from the bench.
#[derive(Debug, Clone)]
struct PendingAssay {
    /// Hour the result becomes available to the estimator.
    release: f64,
    assay: Assay,
}

/// Offline concentration assays drawn from a recorded truth trajectory.
///
/// Samples are taken on a fixed schedule, corrupted with bench noise, and
/// handed out only once the turnaround delay has passed. A delayed result
/// carries its draw time, so the estimator fuses it where it belongs.
#[derive(Debug)]
pub struct ScheduledAssays {
    pending: VecDeque<PendingAssay>,
}

impl ScheduledAssays {
    /// Draws every scheduled sample from the truth log.
    ///
    /// `times` and `states` are the truth trajectory on the driver's step
    /// grid; draws snap to the nearest recorded point at or after the
    /// scheduled hour.
    pub fn sample_truth(
        times: &[f64],
        states: &[State],
        layout: &[StateVar],
        settings: &AssaySettings,
        rng: &mut SimulationRng,
    ) -> Self {
        let position = |var: StateVar| {
            layout
                .iter()
                .position(|v| *v == var)
                .expect("assay channel missing from the layout")
        };
        let glucose = position(StateVar::Glucose);
        let fumarate = position(StateVar::Fumarate);
        let ethanol = position(StateVar::Ethanol);
        let volume = position(StateVar::LiquidVolume);

        let channels: Vec<Normal<f64>> = settings
            .noise_std
            .iter()
            .map(|std| Normal::new(0.0, *std).expect("bench noise must be non-negative"))
            .collect();

        let mut pending = VecDeque::new();
        let mut draw = settings.first_hour;
        let end = times.last().copied().unwrap_or(0.0);
        while draw <= end {
            let index = times.partition_point(|t| *t < draw - 1e-9);
            let x = &states[index];
            let v = x[volume];
            let true_conc = [x[glucose] / v, x[fumarate] / v, x[ethanol] / v];
            let values = DVector::from_iterator(
                3,
                true_conc
                    .iter()
                    .zip(&channels)
                    .map(|(c, dist)| c + dist.sample(&mut rng.0)),
            );
            let assay = if settings.delay_hours > 0.0 {
                Assay::backdated(times[index], values)
            } else {
                Assay::synchronous(values)
            };
            pending.push_back(PendingAssay {
                release: times[index] + settings.delay_hours,
                assay,
            });
            draw += settings.sample_interval;
        }
        Self { pending }
    }

    /// Results still queued, as (release hour, assay) pairs.
    pub fn queued(&self) -> impl Iterator<Item = (f64, &Assay)> + '_ {
        self.pending.iter().map(|p| (p.release, &p.assay))
    }
}

impl MeasurementSource for ScheduledAssays {
    fn poll(&mut self, t: f64) -> Vec<Assay> {
        let mut ready = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.release <= t {
                // The deque is release-ordered, so we can pop from the front.
                let p = self.pending.pop_front();
                if let Some(p) = p {
                    ready.push(p.assay);
                }
            } else {
                break;
            }
        }
        ready
    }
}
