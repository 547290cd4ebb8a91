use serde::{Deserialize, Serialize};
use crate::error::Error;




/// Mass of the trace heavy element, in units of the hydrogen mass. The trace
/// element is assumed fully ionized and contributes one electron per atom.
///
pub const TRACE_ELEMENT_MASS: f64 = 14.0;

/// Timestep returned by a cell which places no constraint on the sub-cycle.
///
pub const LARGE: f64 = 1.0e100;

/// Neutral density within this factor of the ionization floor counts as being
/// at the floor.
///
pub const FLOOR_TOLERANCE: f64 = 1.0001;

/// Flip count past which the neutral-density rate of a cell is damped.
///
pub const DAMPING_THRESHOLD: u32 = 4;

/// Multiplier applied to the rates once per flip past the threshold.
///
pub const DAMPING_FACTOR: f64 = 0.5;




#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]

/**
 * Parameter table for the ionizing radiation module. Physical constants are
 * in problem units; the defaults are cgs. Any field missing from a
 * deserialized table takes its default value.
 */
pub struct RadiationConfig {
    /// Photoionization cross section of neutral hydrogen
    pub sigma_ph: f64,
    /// Mass of a hydrogen atom
    pub m_h: f64,
    /// Mean mass per particle of the neutral gas
    pub mu: f64,
    /// Thermal energy deposited per photoionization
    pub e_gamma: f64,
    /// Mass abundance of the trace element, relative to the total
    pub alpha_c: f64,
    /// Boltzmann constant
    pub k_b: f64,
    /// Seconds per code time unit
    pub time_unit: f64,

    /// Fractional change limits applied per sub-cycle iteration
    pub max_de_iter: f64,
    pub max_de_therm_iter: f64,
    pub max_dx_iter: f64,

    /// Fractional change limits applied to the whole hydrodynamic step; a
    /// value <= 0 disables the corresponding check.
    pub max_de_step: f64,
    pub max_de_therm_step: f64,
    pub max_dx_step: f64,

    pub t_floor: f64,
    /// A value <= 0 disables the ceiling.
    pub t_ceil: f64,
    pub max_iter: usize,

    /// Adiabatic index and Courant number for the hydrodynamic timestep
    /// estimate made between sub-cycle iterations.
    pub gamma: f64,
    pub courant_number: f64,

    /// Minimum neutral fraction kept in every cell
    pub ion_frac_floor: f64,
    /// Optical depth of a cell at the neutral density floor
    pub min_opt_depth: f64,
    /// Remaining flux fraction below which a ray is terminated
    pub min_flux_frac: f64,
    /// Ionization parameter at which a cell is treated as D-type saturated
    pub critical_ionization: f64,
    /// Number of out-of-range cells tolerated before sub-cycling stops
    pub max_cell_count: u64,
    /// Time over which the source flux is ramped up from zero, <= 0 to disable
    pub ramp_time: f64,
}




// ============================================================================
impl Default for RadiationConfig {
    fn default() -> Self {
        Self {
            sigma_ph: 6.3e-18,
            m_h: 1.6733e-24,
            mu: 2.1e-24,
            e_gamma: 3.8e-12,
            alpha_c: 1.0e-4,
            k_b: 1.380658e-16,
            time_unit: 1.0,
            max_de_iter: 0.1,
            max_de_therm_iter: 0.1,
            max_dx_iter: 0.1,
            max_de_step: 2.0,
            max_de_therm_step: 2.0,
            max_dx_step: 2.0,
            t_floor: 10.0,
            t_ceil: 0.0,
            max_iter: 10000,
            gamma: 5.0 / 3.0,
            courant_number: 0.4,
            ion_frac_floor: 1.0e-6,
            min_opt_depth: 1.0e-3,
            min_flux_frac: 1.0e-6,
            critical_ionization: 1.0e10,
            max_cell_count: 10,
            ramp_time: 4.0e4,
        }
    }
}




// ============================================================================
impl RadiationConfig {

    /**
     * Check that the physical constants are positive and the limits are
     * non-negative.
     */
    pub fn validate(&self) -> Result<(), Error> {
        let positive = [
            ("sigma_ph", self.sigma_ph),
            ("m_h", self.m_h),
            ("mu", self.mu),
            ("k_b", self.k_b),
            ("time_unit", self.time_unit),
            ("max_de_iter", self.max_de_iter),
            ("max_de_therm_iter", self.max_de_therm_iter),
            ("max_dx_iter", self.max_dx_iter),
            ("t_floor", self.t_floor),
            ("gamma - 1", self.gamma - 1.0),
            ("courant_number", self.courant_number),
        ];
        for (name, value) in positive.iter() {
            if !(*value > 0.0) {
                return Err(Error::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        let non_negative = [
            ("e_gamma", self.e_gamma),
            ("alpha_c", self.alpha_c),
            ("ion_frac_floor", self.ion_frac_floor),
            ("min_opt_depth", self.min_opt_depth),
            ("min_flux_frac", self.min_flux_frac),
            ("critical_ionization", self.critical_ionization),
        ];
        for (name, value) in non_negative.iter() {
            if !(*value >= 0.0) {
                return Err(Error::InvalidConfig(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig("max_iter must be at least 1".into()));
        }
        if self.t_ceil > 0.0 && self.t_ceil < self.t_floor {
            return Err(Error::InvalidConfig(format!(
                "t_ceil ({}) is below t_floor ({})",
                self.t_ceil, self.t_floor
            )));
        }
        Ok(())
    }

    /**
     * Density of neutral hydrogen giving an optical depth of `min_opt_depth`
     * across a cell of the given length.
     */
    pub fn floor_density(&self, cell_length: f64) -> f64 {
        self.min_opt_depth * self.m_h / (self.sigma_ph * cell_length)
    }

    /**
     * Source flux at the given simulation time, ramped logarithmically from
     * zero over `ramp_time`.
     */
    pub fn ramped_flux(&self, flux: f64, time: f64) -> f64 {
        if self.ramp_time > 0.0 && time <= self.ramp_time {
            flux * (time.max(0.0)).ln_1p() / self.ramp_time.ln_1p()
        } else {
            flux
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::RadiationConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(RadiationConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_cross_section_is_rejected() {
        let config = RadiationConfig { sigma_ph: 0.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn flux_ramp_works() {
        let config = RadiationConfig { ramp_time: 100.0, ..Default::default() };
        assert_eq!(config.ramped_flux(1e9, 0.0), 0.0);
        assert!((config.ramped_flux(1e9, 100.0) - 1e9).abs() < 1e-3);
        assert_eq!(config.ramped_flux(1e9, 200.0), 1e9);
        assert!(config.ramped_flux(1e9, 10.0) < config.ramped_flux(1e9, 20.0));

        let config = RadiationConfig { ramp_time: 0.0, ..Default::default() };
        assert_eq!(config.ramped_flux(1e9, 0.0), 1e9);
    }

    #[test]
    fn partial_table_takes_defaults() {
        let partial = rmp_serde::to_vec_named(&std::collections::HashMap::from([("t_floor", 50.0)])).unwrap();
        let config: RadiationConfig = rmp_serde::from_slice(&partial).unwrap();
        assert_eq!(config.t_floor, 50.0);
        assert_eq!(config.max_iter, RadiationConfig::default().max_iter);
    }
}
