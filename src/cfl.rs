use crate::config::RadiationConfig;
use crate::error::Error;
use crate::geometry::Axis;
use crate::grid::{Conserved, Grid};
use crate::message::comm::{Collective, Communicator};




// ============================================================================
impl Conserved {

    pub fn gas_pressure(&self, gamma_law_index: f64) -> f64 {
        (gamma_law_index - 1.0) * self.thermal_energy()
    }

    pub fn sound_speed_squared(&self, gamma_law_index: f64) -> f64 {
        gamma_law_index * self.gas_pressure(gamma_law_index) / self.density
    }

    /**
     * Fast magnetosonic speed for waves travelling along the given axis. This
     * reduces to the sound speed when the magnetic field vanishes.
     */
    pub fn fast_speed(&self, axis: Axis, gamma_law_index: f64) -> f64 {
        let a2 = self.sound_speed_squared(gamma_law_index);
        let b2 = 2.0 * self.magnetic_energy() / self.density;
        let bn = self.magnetic[axis.index()];
        let bn2 = bn * bn / self.density;
        let sum = a2 + b2;
        let disc = (sum * sum - 4.0 * a2 * bn2).max(0.0);
        (0.5 * (sum + disc.sqrt())).sqrt()
    }

    /**
     * The largest signal speed along the given axis.
     */
    pub fn max_signal_speed(&self, axis: Axis, gamma_law_index: f64) -> f64 {
        self.velocity(axis).abs() + self.fast_speed(axis, gamma_law_index)
    }
}




/**
 * Estimate the hydrodynamic timestep a grid can take: the Courant number over
 * the largest ratio of signal speed to cell width on any axis of any
 * interior cell, min-reduced over the processes sharing the domain.
 */
pub fn hydro_time_step<C: Communicator>(
    grid: &Grid,
    config: &RadiationConfig,
    collective: &Collective<C>,
) -> Result<f64, Error> {
    let mut max_rate: f64 = 0.0;

    for index in grid.interior().iter() {
        let u = grid.cell(index);

        for axis in Axis::ALL.iter() {
            max_rate = max_rate.max(u.max_signal_speed(*axis, config.gamma) / grid.cell_length(*axis))
        }
    }
    let dt = if max_rate > 0.0 { config.courant_number / max_rate } else { f64::INFINITY };
    collective.min_f64(dt)
}
