// fermenter_core/src/models/fumaric.rs
//
// Fed-batch fumarate fermentation kinetics. Five lumped pathways share the
// glucose uptake: direct fumarate formation, the TCA cycle, respiration,
// ethanol overflow and biomass growth. The fumarate and ethanol fluxes are
// driven by saturation kinetics, respiration and TCA close the ATP and NADH
// balances, and two regulator pools shift the ethanol flux as they deplete.

use crate::error::EstimatorError;
use crate::inputs::FeedStreams;
use crate::models::ProcessModel;
use crate::state::StateVar;
use crate::types::State;
use nalgebra::{Matrix5, Vector5};
use serde::Deserialize;

/// Number of state variables the fumarate scheme carries.
pub const STATE_DIM: usize = 14;

// Positions inside the canonical layout. `layout_matches_indices` in the
// tests keeps these honest.
const GLUCOSE: usize = 0;
const BIOMASS: usize = 1;
const FUMARATE: usize = 2;
const ETHANOL: usize = 3;
const GAS_CO2: usize = 4;
const GAS_O2: usize = 5;
const NITROGEN: usize = 6;
const ACID: usize = 7;
const BASE: usize = 8;
const REGULATOR_Z: usize = 9;
const REGULATOR_Y: usize = 10;
const LIQUID_VOLUME: usize = 11;
const GAS_VOLUME: usize = 12;
const TEMPERATURE: usize = 13;

/// The canonical state ordering of the fumarate scheme.
pub fn state_layout() -> Vec<StateVar> {
    vec![
        StateVar::Glucose,
        StateVar::Biomass,
        StateVar::Fumarate,
        StateVar::Ethanol,
        StateVar::GasCo2,
        StateVar::GasO2,
        StateVar::Nitrogen,
        StateVar::Acid,
        StateVar::Base,
        StateVar::RegulatorZ,
        StateVar::RegulatorY,
        StateVar::LiquidVolume,
        StateVar::GasVolume,
        StateVar::Temperature,
    ]
}

/// Tunable constants of the fumarate scheme. Defaults are the fitted pilot
/// values; a scenario file can override any subset.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FumaricParams {
    /// CO2 released per unit of biomass-precursor flux.
    pub biomass_co2_yield: f64,
    /// ATP demand of the biomass reaction.
    pub atp_per_biomass: f64,
    /// NADH yield of the biomass reaction.
    pub nadh_per_biomass: f64,
    /// Maintenance ATP demand, mol/(mol biomass h).
    pub atp_maintenance: f64,
    /// Nitrogen drawn per unit of biomass formed.
    pub nitrogen_per_biomass: f64,
    /// Saturation ceiling of the fumarate flux.
    pub fumarate_vmax: f64,
    /// Glucose half-saturation of the fumarate flux, mol/L.
    pub fumarate_km: f64,
    /// Ethanol flux with both regulator pools exhausted.
    pub ethanol_base_rate: f64,
    /// Glucose half-saturation of the ethanol flux, mol/L.
    pub ethanol_km: f64,
    /// Ethanol suppression while the Z pool lasts.
    pub regulator_z_rate: f64,
    /// Ethanol boost per unit of Y pool concentration.
    pub regulator_y_rate: f64,
    /// Z pool consumed per unit of suppressed flux.
    pub regulator_z_stoich: f64,
    /// Y pool consumed per unit of boosted flux.
    pub regulator_y_stoich: f64,
    /// Volumetric heat capacity of the broth, kJ/(L K).
    pub heat_capacity: f64,
    /// Heat loss to the surroundings, kJ/(h K).
    pub heat_loss: f64,
}

impl Default for FumaricParams {
    fn default() -> Self {
        Self {
            biomass_co2_yield: 0.1,
            atp_per_biomass: 1.8,
            nadh_per_biomass: 0.1,
            atp_maintenance: 1.0e-4,
            nitrogen_per_biomass: 0.2,
            fumarate_vmax: 0.59,
            fumarate_km: 7.0,
            ethanol_base_rate: 2.0 / 46.0 / 120.0 * 3.2,
            ethanol_km: 1.0e-3,
            regulator_z_rate: 0.6 / 46.0 / 40.0 * 3.0 + 2.0 / 46.0 / 120.0 * 3.0,
            regulator_y_rate: (0.6 / 46.0 / 25.0 * 3.0 + 0.6 / 46.0 / 40.0) * 4.0,
            regulator_z_stoich: 190.0,
            regulator_y_stoich: 95.0,
            heat_capacity: 4.184,
            heat_loss: 2.0,
        }
    }
}

/// The fumarate fermentation model over the canonical 14-variable layout.
#[derive(Debug, Clone)]
pub struct FumaricKinetics {
    params: FumaricParams,
    layout: Vec<StateVar>,
    // Inverse of the pathway stoichiometry, taken once at construction.
    flux_inverse: Matrix5<f64>,
}

impl FumaricKinetics {
    /// Builds the model, inverting the pathway stoichiometry up front.
    ///
    /// Rows of the stoichiometry: the fumarate drive, the ethanol drive, a
    /// pinned growth flux, the ATP balance and the NADH balance. Columns
    /// are the five unknown pathway fluxes.
    pub fn new(params: FumaricParams) -> Result<Self, EstimatorError> {
        #[rustfmt::skip]
        let stoichiometry = Matrix5::new(
             1.0,  0.0, 0.0,       0.0, 0.0,
             0.0,  0.0, 0.0,       1.0, 0.0,
             0.0,  0.0, 0.0,       0.0, 1.0,
            -3.0,  4.0, 7.0 / 3.0, 2.0, params.atp_per_biomass,
             0.0, 12.0, -1.0,      0.0, params.nadh_per_biomass,
        );
        let flux_inverse = stoichiometry
            .try_inverse()
            .ok_or(EstimatorError::SingularRateMatrix)?;
        Ok(Self {
            params,
            layout: state_layout(),
            flux_inverse,
        })
    }

    pub fn params(&self) -> &FumaricParams {
        &self.params
    }
}

impl ProcessModel for FumaricKinetics {
    fn layout(&self) -> &[StateVar] {
        &self.layout
    }

    fn derivatives(&self, x: &State, streams: &FeedStreams, _t: f64) -> State {
        let p = &self.params;

        // Rates see the physical, floored-at-zero holdups. The carried
        // vector is never clamped; only this view is.
        let n = |i: usize| x[i].max(0.0);

        let v = n(LIQUID_VOLUME);
        let vg = n(GAS_VOLUME);

        let cg = n(GLUCOSE) / v;
        let cfa = n(FUMARATE) / v;
        let ce = n(ETHANOL) / v;
        let cn = n(NITROGEN) / v;
        let ca = n(ACID) / v;
        let cb = n(BASE) / v;
        let cz = n(REGULATOR_Z) / v;
        let cy = n(REGULATOR_Y) / v;
        let cco = n(GAS_CO2) / vg;
        let co = n(GAS_O2) / vg;

        // The Z pool suppresses ethanol at a fixed rate until it runs out;
        // the Y pool boosts it in proportion to what remains.
        let r_z = if cz > 0.0 { p.regulator_z_rate } else { 0.0 };
        let r_y = p.regulator_y_rate * cy;

        let fumarate_drive = p.fumarate_vmax * cg / (p.fumarate_km + cg);
        let ethanol_drive = (p.ethanol_base_rate + r_y - r_z) * cg / (p.ethanol_km + cg);

        let demand = Vector5::new(
            fumarate_drive,
            ethanol_drive,
            0.0,
            p.atp_maintenance,
            0.0,
        );
        let flux = self.flux_inverse * demand;
        let (r_fa_p, r_tca, r_resp, r_e_p, r_x_p) =
            (flux[0], flux[1], flux[2], flux[3], flux[4]);

        // Specific rates per unit biomass.
        let r_g = -r_fa_p - r_tca - r_e_p - r_x_p;
        let r_x = 6.0 * r_x_p;
        let r_fa = 2.0 * r_fa_p + 0.5 * r_z;
        let r_e = 2.0 * r_e_p;
        let r_co = -2.0 * r_fa_p + 6.0 * r_tca + 2.0 * r_e_p + p.biomass_co2_yield * r_x_p;
        let r_o = -0.5 * r_resp;

        let nx = n(BIOMASS);

        let mut dx = State::zeros(STATE_DIM);
        dx[GLUCOSE] =
            streams.glucose_feed * streams.glucose_feed_conc - streams.liquid_out * cg + r_g * nx;
        dx[BIOMASS] = r_x * nx;
        dx[FUMARATE] = -streams.liquid_out * cfa + r_fa * nx;
        dx[ETHANOL] = -streams.liquid_out * ce + r_e * nx;
        dx[GAS_CO2] =
            streams.co2_feed * streams.co2_feed_conc - streams.gas_out * cco + r_co * nx;
        dx[GAS_O2] = streams.o2_feed * streams.o2_feed_conc - streams.gas_out * co - r_o * nx;
        dx[NITROGEN] = streams.nitrogen_feed * streams.nitrogen_feed_conc
            - streams.liquid_out * cn
            - p.nitrogen_per_biomass * r_x * nx;
        dx[ACID] = -streams.liquid_out * ca;
        dx[BASE] = streams.base_feed * streams.base_feed_conc - streams.liquid_out * cb;
        dx[REGULATOR_Z] = -p.regulator_z_stoich * r_z * nx;
        dx[REGULATOR_Y] = -p.regulator_y_stoich * r_y * nx;
        dx[LIQUID_VOLUME] = streams.net_liquid_flow();
        dx[GAS_VOLUME] = streams.net_gas_flow();
        dx[TEMPERATURE] = (streams.heater_duty
            - p.heat_loss * (x[TEMPERATURE] - streams.ambient_temp))
            / (p.heat_capacity * v);
        dx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn resting_state() -> State {
        let mut x = DVector::zeros(STATE_DIM);
        x[BIOMASS] = 0.01;
        x[LIQUID_VOLUME] = 1.077;
        x[GAS_VOLUME] = 0.1;
        x[TEMPERATURE] = 25.0;
        x
    }

    #[test]
    fn layout_matches_indices() {
        let layout = state_layout();
        assert_eq!(layout.len(), STATE_DIM);
        assert_eq!(layout[GLUCOSE], StateVar::Glucose);
        assert_eq!(layout[BIOMASS], StateVar::Biomass);
        assert_eq!(layout[FUMARATE], StateVar::Fumarate);
        assert_eq!(layout[ETHANOL], StateVar::Ethanol);
        assert_eq!(layout[GAS_CO2], StateVar::GasCo2);
        assert_eq!(layout[GAS_O2], StateVar::GasO2);
        assert_eq!(layout[NITROGEN], StateVar::Nitrogen);
        assert_eq!(layout[ACID], StateVar::Acid);
        assert_eq!(layout[BASE], StateVar::Base);
        assert_eq!(layout[REGULATOR_Z], StateVar::RegulatorZ);
        assert_eq!(layout[REGULATOR_Y], StateVar::RegulatorY);
        assert_eq!(layout[LIQUID_VOLUME], StateVar::LiquidVolume);
        assert_eq!(layout[GAS_VOLUME], StateVar::GasVolume);
        assert_eq!(layout[TEMPERATURE], StateVar::Temperature);
    }

    #[test]
    fn starved_culture_burns_glucose_for_maintenance_only() {
        // With no glucose and no regulator pools, only the maintenance
        // demand drives the balance closure: 32 * rTCA = atp_maintenance,
        // respiration at twelve times the TCA flux.
        let model = FumaricKinetics::new(FumaricParams::default()).unwrap();
        let x = resting_state();
        let dx = model.derivatives(&x, &FeedStreams::default(), 0.0);

        let r_tca = 1.0e-4 / 32.0;
        let nx = 0.01;
        assert_relative_eq!(dx[GLUCOSE], -r_tca * nx, epsilon = 1e-15);
        assert_relative_eq!(dx[GAS_CO2], 6.0 * r_tca * nx, epsilon = 1e-15);
        assert_relative_eq!(dx[GAS_O2], 6.0 * r_tca * nx, epsilon = 1e-15);
        assert_relative_eq!(dx[BIOMASS], 0.0, epsilon = 1e-15);
        assert_relative_eq!(dx[FUMARATE], 0.0, epsilon = 1e-15);
        assert_relative_eq!(dx[ETHANOL], 0.0, epsilon = 1e-15);
        assert_relative_eq!(dx[NITROGEN], 0.0, epsilon = 1e-15);
        assert_relative_eq!(dx[TEMPERATURE], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn negative_excursions_see_the_floored_rates() {
        let model = FumaricKinetics::new(FumaricParams::default()).unwrap();
        let at_zero = model.derivatives(&resting_state(), &FeedStreams::default(), 0.0);

        let mut excursion = resting_state();
        excursion[GLUCOSE] = -1.0e-6;
        excursion[FUMARATE] = -1.0e-7;
        let at_excursion = model.derivatives(&excursion, &FeedStreams::default(), 0.0);

        for i in 0..STATE_DIM {
            assert_relative_eq!(at_excursion[i], at_zero[i], epsilon = 1e-15);
        }
    }

    #[test]
    fn draw_washes_products_out() {
        let model = FumaricKinetics::new(FumaricParams::default()).unwrap();
        let mut x = resting_state();
        x[BIOMASS] = 0.0;
        x[FUMARATE] = 0.5;
        x[LIQUID_VOLUME] = 1.0;
        let streams = FeedStreams {
            liquid_out: 0.1,
            ..FeedStreams::default()
        };
        let dx = model.derivatives(&x, &streams, 0.0);
        assert_relative_eq!(dx[FUMARATE], -0.05, epsilon = 1e-12);
        assert_relative_eq!(dx[LIQUID_VOLUME], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn feeds_accumulate_without_biomass() {
        let model = FumaricKinetics::new(FumaricParams::default()).unwrap();
        let mut x = resting_state();
        x[BIOMASS] = 0.0;
        let streams = FeedStreams {
            glucose_feed: 0.02,
            glucose_feed_conc: 1.5,
            base_feed: 6.0e-5,
            base_feed_conc: 10.0,
            ..FeedStreams::default()
        };
        let dx = model.derivatives(&x, &streams, 0.0);
        assert_relative_eq!(dx[GLUCOSE], 0.03, epsilon = 1e-12);
        assert_relative_eq!(dx[BASE], 6.0e-4, epsilon = 1e-12);
        assert_relative_eq!(dx[LIQUID_VOLUME], 0.02 + 6.0e-5, epsilon = 1e-12);
    }

    #[test]
    fn broth_relaxes_toward_ambient() {
        let model = FumaricKinetics::new(FumaricParams::default()).unwrap();
        let mut x = resting_state();
        x[TEMPERATURE] = 30.0;
        x[LIQUID_VOLUME] = 1.0;
        let dx = model.derivatives(&x, &FeedStreams::default(), 0.0);
        assert_relative_eq!(dx[TEMPERATURE], -2.0 * 5.0 / 4.184, epsilon = 1e-12);

        let heated = FeedStreams {
            heater_duty: 4.184,
            ambient_temp: 30.0,
            ..FeedStreams::default()
        };
        let dx = model.derivatives(&x, &heated, 0.0);
        assert_relative_eq!(dx[TEMPERATURE], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn regulator_pools_steer_the_ethanol_flux() {
        let model = FumaricKinetics::new(FumaricParams::default()).unwrap();

        // Plenty of glucose so the saturation terms are near their ceiling.
        let mut suppressed = resting_state();
        suppressed[GLUCOSE] = 10.0;
        suppressed[REGULATOR_Z] = 1.0e-3;
        let mut boosted = suppressed.clone();
        boosted[REGULATOR_Z] = 0.0;
        boosted[REGULATOR_Y] = 1.0e-2;

        let dx_suppressed = model.derivatives(&suppressed, &FeedStreams::default(), 0.0);
        let dx_boosted = model.derivatives(&boosted, &FeedStreams::default(), 0.0);
        assert!(dx_boosted[ETHANOL] > dx_suppressed[ETHANOL]);

        // Steering consumes the pools.
        assert!(dx_suppressed[REGULATOR_Z] < 0.0);
        assert!(dx_boosted[REGULATOR_Y] < 0.0);
    }
}
