// fermenter_sim/src/config.rs

use fermenter_core::models::fumaric::{state_layout, FumaricParams};
use fermenter_core::prelude::{MerweScaling, State, StateVar};
use serde::Deserialize;

// Molar masses used to convert the charged masses and dosing rates from
// the bench units (grams) into the mole holdups the model carries.
pub const GLUCOSE_MOLAR_MASS: f64 = 180.0;
// Biomass as C H_1.8 O_0.5 N_0.2.
pub const BIOMASS_MOLAR_MASS: f64 = 24.6;
pub const UREA_MOLAR_MASS: f64 = 60.0;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// The root of the data parsed from a scenario TOML file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [run] section is missing
    pub run: RunSettings,

    #[serde(default)]
    pub reactor: ReactorCharge,

    #[serde(default)]
    pub feed: FeedSettings,

    #[serde(default)]
    pub kinetics: FumaricParams,

    #[serde(default)]
    pub estimator: EstimatorSettings,

    #[serde(default)]
    pub assays: AssaySettings,
}

// =========================================================================
// == Configuration Sub-Structs ==
// These map directly to the sections in a scenario TOML file.
// =========================================================================

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Duration of the run in hours.
    pub duration_hours: f64,
    /// Driver step between estimator calls, hours.
    pub step_hours: f64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            seed: None,
            duration_hours: 230.0,
            step_hours: 0.25,
        }
    }
}

/// What is in the vessel at hour zero.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReactorCharge {
    /// Glucose charge, grams.
    pub glucose_g: f64,
    /// Inoculum dry weight, grams.
    pub biomass_g: f64,
    /// Urea charge, grams.
    pub urea_g: f64,
    /// Dissolved fumaric acid, moles.
    pub acid_mol: f64,
    /// Broth volume, litres.
    pub volume_l: f64,
    /// Headspace volume, litres.
    pub headspace_l: f64,
    /// Broth temperature, degrees Celsius.
    pub temperature_c: f64,
    /// Hour at which the spent batch medium is flushed: residual substrate,
    /// products and dissolved gases drop to zero while the culture stays.
    pub flush_hour: Option<f64>,
}

impl Default for ReactorCharge {
    fn default() -> Self {
        Self {
            glucose_g: 3.1,
            biomass_g: 1.0e-3,
            urea_g: 2.0,
            acid_mol: 1.0e-5,
            volume_l: 1.077,
            headspace_l: 0.1,
            temperature_c: 25.0,
            flush_hour: Some(26.0),
        }
    }
}

impl ReactorCharge {
    /// The initial holdup vector, with the charged masses converted to
    /// moles.
    pub fn initial_state(&self) -> State {
        let layout = state_layout();
        let mut x = State::zeros(layout.len());
        for (i, var) in layout.iter().enumerate() {
            x[i] = match var {
                StateVar::Glucose => self.glucose_g / GLUCOSE_MOLAR_MASS,
                StateVar::Biomass => self.biomass_g / BIOMASS_MOLAR_MASS,
                StateVar::Nitrogen => self.urea_g / UREA_MOLAR_MASS,
                StateVar::Acid => self.acid_mol,
                StateVar::LiquidVolume => self.volume_l,
                StateVar::GasVolume => self.headspace_l,
                StateVar::Temperature => self.temperature_c,
                _ => 0.0,
            };
        }
        x
    }
}

/// One glucose dosing setpoint; the latest one whose hour has passed wins.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct DosingStep {
    /// Hour from which this rate applies.
    pub from: f64,
    /// Glucose dosing rate, g/h.
    pub rate: f64,
}

/// The feed train around the vessel. Liquid feeds stay closed through the
/// batch phase; the gas sparge runs from hour zero.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeedSettings {
    /// Hours of batch operation before the liquid feeds open.
    pub batch_hours: f64,
    /// Glucose feed concentration, mol/L.
    pub glucose_conc: f64,
    /// Stepwise glucose dosing profile.
    pub dosing: Vec<DosingStep>,
    /// Urea dosing rate, mg/h.
    pub nitrogen_dosing_mg: f64,
    /// Urea feed concentration, mol/L.
    pub nitrogen_conc: f64,
    /// Base feed rate, L/h.
    pub base_rate: f64,
    /// Base feed concentration, mol/L.
    pub base_conc: f64,
    /// CO2 sparge at the rotameter, mL/min.
    pub co2_sparge_ml_min: f64,
    /// CO2 content of the sparge, mole percent.
    pub co2_percent: f64,
    /// O2 sparge at the rotameter, mL/min.
    pub o2_sparge_ml_min: f64,
    /// O2 content of the sparge, mole percent.
    pub o2_percent: f64,
    /// Sparge supply pressure, kPa.
    pub pressure_kpa: f64,
    /// Sparge supply temperature, Kelvin.
    pub supply_temp_k: f64,
    /// Ambient temperature around the vessel, degrees Celsius.
    pub ambient_temp: f64,
    /// Heater duty delivered to the broth.
    pub heater_duty: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            batch_hours: 30.0,
            glucose_conc: 314.19206 / 180.0,
            dosing: vec![
                DosingStep {
                    from: 0.0,
                    rate: 0.141612826257827,
                },
                DosingStep {
                    from: 96.0,
                    rate: 0.21241923938674,
                },
                DosingStep {
                    from: 176.0,
                    rate: 0.42483847877348,
                },
            ],
            nitrogen_dosing_mg: 0.625,
            nitrogen_conc: 0.625 * 10.0 / 60.0,
            base_rate: 6.0e-5,
            base_conc: 10.0,
            co2_sparge_ml_min: 8.67,
            co2_percent: 8.7,
            o2_sparge_ml_min: 99.92,
            o2_percent: 21.0,
            pressure_kpa: 87.0,
            supply_temp_k: 298.0,
            ambient_temp: 25.0,
            heater_duty: 5.0 / 9.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EstimatorSettings {
    /// Hours between filter predictions.
    pub predict_interval: f64,
    /// Diagonal of the process noise, one entry per state variable.
    pub process_noise: Vec<f64>,
    #[serde(default)]
    pub scaling: MerweScaling,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            predict_interval: 1.0,
            process_noise: vec![
                1e-6, 1e-3, 1e-5, 1e-4, 1e-5, 1e-5, 1e-5, 1e-5, 1e-5, 1e-2, 1e-2, 1e-5, 1e-5,
                1e-1,
            ],
            scaling: MerweScaling::default(),
        }
    }
}

/// How the offline lab works: when samples are drawn, how noisy the bench
/// is, and how long results take to come back.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AssaySettings {
    /// Hour of the first sample draw.
    pub first_hour: f64,
    /// Hours between sample draws.
    pub sample_interval: f64,
    /// Hours between a draw and its result coming back.
    pub delay_hours: f64,
    /// Bench noise standard deviation per channel (glucose, fumarate,
    /// ethanol), mol/L. Also sets the filter's measurement covariance.
    pub noise_std: Vec<f64>,
}

impl Default for AssaySettings {
    fn default() -> Self {
        Self {
            first_hour: 12.0,
            sample_interval: 12.0,
            delay_hours: 6.0,
            noise_std: vec![1.0e-6, 1.0e-6, 1.0e-6],
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_describe_the_standard_run() {
        let config = ScenarioConfig::default();
        assert_eq!(config.run.seed, None);
        assert_relative_eq!(config.run.duration_hours, 230.0);
        assert_relative_eq!(config.feed.glucose_conc, 314.19206 / 180.0);
        assert_eq!(config.feed.dosing.len(), 3);
        assert_relative_eq!(config.estimator.predict_interval, 1.0);
        assert_eq!(config.estimator.process_noise.len(), 14);
    }

    #[test]
    fn charge_converts_masses_to_moles() {
        let x = ReactorCharge::default().initial_state();
        let layout = state_layout();
        let at = |var: StateVar| {
            let i = layout.iter().position(|v| *v == var).unwrap();
            x[i]
        };
        assert_relative_eq!(at(StateVar::Glucose), 3.1 / 180.0, epsilon = 1e-15);
        assert_relative_eq!(at(StateVar::Biomass), 1.0e-3 / 24.6, epsilon = 1e-15);
        assert_relative_eq!(at(StateVar::Nitrogen), 2.0 / 60.0, epsilon = 1e-15);
        assert_relative_eq!(at(StateVar::LiquidVolume), 1.077, epsilon = 1e-15);
        assert_relative_eq!(at(StateVar::Temperature), 25.0, epsilon = 1e-15);
        assert_relative_eq!(at(StateVar::Ethanol), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn scenario_sections_override_the_defaults() {
        let toml = r#"
            [run]
            seed = 7
            duration_hours = 60.0
            step_hours = 0.5

            [estimator]
            predict_interval = 2.0
            process_noise = [1e-6, 1e-3, 1e-5, 1e-4, 1e-5, 1e-5, 1e-5, 1e-5, 1e-5, 1e-2, 1e-2, 1e-5, 1e-5, 1e-1]

            [estimator.scaling]
            alpha = 0.01
        "#;
        let config: ScenarioConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.run.seed, Some(7));
        assert_relative_eq!(config.run.duration_hours, 60.0);
        assert_relative_eq!(config.estimator.predict_interval, 2.0);
        assert_relative_eq!(config.estimator.scaling.alpha, 0.01);
        // Untouched sections fall back wholesale.
        assert_relative_eq!(config.reactor.volume_l, 1.077);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml = r#"
            [run]
            duration_hurs = 60.0
        "#;
        assert!(toml::from_str::<ScenarioConfig>(toml).is_err());
    }
}
