// fermenter_core/src/inputs.rs

use dyn_clone::DynClone;
use std::fmt::Debug;

/// One sample of every manipulated stream entering or leaving the reactor.
///
/// Liquid flows are L/h, feed concentrations mol/L, gas flows mol/h with
/// their matching inlet strengths, heater duty kJ/h.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedStreams {
    /// Substrate feed rate.
    pub glucose_feed: f64,
    /// Substrate strength of the feed.
    pub glucose_feed_conc: f64,
    /// Nitrogen-source feed rate.
    pub nitrogen_feed: f64,
    /// Nitrogen strength of the feed.
    pub nitrogen_feed_conc: f64,
    /// Base titrant feed rate.
    pub base_feed: f64,
    /// Base strength of the titrant.
    pub base_feed_conc: f64,
    /// Species-free makeup water feed rate.
    pub makeup_feed: f64,
    /// Broth draw rate.
    pub liquid_out: f64,
    /// CO2 sparge rate.
    pub co2_feed: f64,
    /// CO2 strength of the sparge.
    pub co2_feed_conc: f64,
    /// O2 / air sparge rate.
    pub o2_feed: f64,
    /// O2 strength of the sparge.
    pub o2_feed_conc: f64,
    /// Headspace vent rate.
    pub gas_out: f64,
    /// Temperature of the surroundings, degrees C.
    pub ambient_temp: f64,
    /// Jacket heater duty.
    pub heater_duty: f64,
}

impl Default for FeedStreams {
    /// Nothing flowing, room-temperature surroundings, heater off.
    fn default() -> Self {
        Self {
            glucose_feed: 0.0,
            glucose_feed_conc: 0.0,
            nitrogen_feed: 0.0,
            nitrogen_feed_conc: 0.0,
            base_feed: 0.0,
            base_feed_conc: 0.0,
            makeup_feed: 0.0,
            liquid_out: 0.0,
            co2_feed: 0.0,
            co2_feed_conc: 0.0,
            o2_feed: 0.0,
            o2_feed_conc: 0.0,
            gas_out: 0.0,
            ambient_temp: 25.0,
            heater_duty: 0.0,
        }
    }
}

impl FeedStreams {
    /// Net rate of broth volume change, feeds in minus draw out.
    pub fn net_liquid_flow(&self) -> f64 {
        self.glucose_feed + self.nitrogen_feed + self.base_feed + self.makeup_feed
            - self.liquid_out
    }

    /// Net rate of headspace volume change, sparge in minus vent out.
    pub fn net_gas_flow(&self) -> f64 {
        self.co2_feed + self.o2_feed - self.gas_out
    }

    /// Whether every stream value is a finite number.
    pub fn is_finite(&self) -> bool {
        [
            self.glucose_feed,
            self.glucose_feed_conc,
            self.nitrogen_feed,
            self.nitrogen_feed_conc,
            self.base_feed,
            self.base_feed_conc,
            self.makeup_feed,
            self.liquid_out,
            self.co2_feed,
            self.co2_feed_conc,
            self.o2_feed,
            self.o2_feed_conc,
            self.gas_out,
            self.ambient_temp,
            self.heater_duty,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Source of the manipulated streams as a function of time. Propagation
/// re-samples this at every sub-step, so a provider sees the actual
/// integration grid, not just the outer step boundaries.
pub trait InputProvider: DynClone + Debug + Send + Sync {
    /// Feed and draw rates in effect at time `t`.
    fn sample(&self, t: f64) -> FeedStreams;
}

dyn_clone::clone_trait_object!(InputProvider);

/// Holds one set of streams regardless of the query time.
#[derive(Debug, Clone, Copy)]
pub struct ConstantInputs(pub FeedStreams);

impl InputProvider for ConstantInputs {
    fn sample(&self, _t: f64) -> FeedStreams {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn net_flows_balance_feeds_against_draws() {
        let streams = FeedStreams {
            glucose_feed: 0.2,
            nitrogen_feed: 0.1,
            base_feed: 0.05,
            makeup_feed: 0.15,
            liquid_out: 0.3,
            co2_feed: 0.02,
            o2_feed: 0.2,
            gas_out: 0.22,
            ..FeedStreams::default()
        };
        assert_relative_eq!(streams.net_liquid_flow(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(streams.net_gas_flow(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn finite_check_rejects_nan_streams() {
        let mut streams = FeedStreams::default();
        assert!(streams.is_finite());
        streams.heater_duty = f64::NAN;
        assert!(!streams.is_finite());
    }

    #[test]
    fn constant_provider_ignores_time() {
        let streams = FeedStreams {
            glucose_feed: 0.125,
            ..FeedStreams::default()
        };
        let provider = ConstantInputs(streams);
        assert_eq!(provider.sample(0.0), streams);
        assert_eq!(provider.sample(1.0e6), streams);
    }
}
