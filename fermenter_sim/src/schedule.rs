// fermenter_sim/src/schedule.rs

use crate::config::{FeedSettings, GLUCOSE_MOLAR_MASS, UREA_MOLAR_MASS};
use fermenter_core::prelude::{FeedStreams, InputProvider};

const GAS_CONSTANT: f64 = 8.314;

/// Turns the scenario's feed settings into the stream tuple the model
/// integrates against. Liquid feeds are closed until the batch phase ends;
/// the draw always balances the liquid feeds, and the gas sparge runs from
/// hour zero.
#[derive(Debug, Clone)]
pub struct BatchFeedSchedule {
    settings: FeedSettings,
}

impl BatchFeedSchedule {
    pub fn new(settings: FeedSettings) -> Self {
        Self { settings }
    }

    /// The glucose dosing setpoint active at `t`, g/h.
    fn dosing_rate(&self, t: f64) -> f64 {
        self.settings
            .dosing
            .iter()
            .rev()
            .find(|step| step.from <= t)
            .map(|step| step.rate)
            .unwrap_or(0.0)
    }

    /// Rotameter reading to a molar flow at the supply pressure.
    fn sparge_molar_flow(&self, ml_min: f64) -> f64 {
        let volumetric = ml_min / 1000.0 * 60.0; // L/h
        self.settings.pressure_kpa * volumetric / (GAS_CONSTANT * self.settings.supply_temp_k)
    }
}

impl InputProvider for BatchFeedSchedule {
    fn sample(&self, t: f64) -> FeedStreams {
        let s = &self.settings;

        let co2_feed = self.sparge_molar_flow(s.co2_sparge_ml_min);
        let o2_feed = self.sparge_molar_flow(s.o2_sparge_ml_min);

        let (glucose_feed, nitrogen_feed, base_feed) = if t < s.batch_hours {
            (0.0, 0.0, 0.0)
        } else {
            let glucose_feed = self.dosing_rate(t) / GLUCOSE_MOLAR_MASS / s.glucose_conc;
            let nitrogen_feed =
                s.nitrogen_dosing_mg / 1000.0 / UREA_MOLAR_MASS / s.nitrogen_conc;
            (glucose_feed, nitrogen_feed, s.base_rate)
        };

        FeedStreams {
            glucose_feed,
            glucose_feed_conc: s.glucose_conc,
            nitrogen_feed,
            nitrogen_feed_conc: s.nitrogen_conc,
            base_feed,
            base_feed_conc: s.base_conc,
            makeup_feed: 0.0,
            liquid_out: glucose_feed + nitrogen_feed + base_feed,
            co2_feed,
            co2_feed_conc: s.co2_percent,
            o2_feed,
            o2_feed_conc: s.o2_percent,
            gas_out: co2_feed + o2_feed,
            ambient_temp: s.ambient_temp,
            heater_duty: s.heater_duty,
        }
    }
}
