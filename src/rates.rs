use crate::array::Array3;
use crate::chemistry;
use crate::config::{RadiationConfig, DAMPING_FACTOR, DAMPING_THRESHOLD, FLOOR_TOLERANCE, LARGE, TRACE_ELEMENT_MASS};
use crate::error::Error;
use crate::grid::{Conserved, Grid};
use crate::message::comm::{Collective, Communicator};




/**
 * Number densities, ionization fraction, and temperature of the gas in one
 * cell
 */
#[derive(Clone, Copy, Debug)]
pub struct Species {
    pub n_h: f64,
    pub n_hplus: f64,
    pub n_e: f64,
    pub x: f64,
    pub mean_mass: f64,
    pub temperature: f64,
}




// ============================================================================
impl Species {

    /**
     * Derive the composition of a cell from its conserved state. Electrons
     * come from ionized hydrogen and from the trace element, which is taken
     * to be fully ionized; the mean particle mass interpolates between
     * ionized hydrogen (half the hydrogen mass) and the neutral gas (`mu`).
     */
    pub fn from_conserved(u: &Conserved, config: &RadiationConfig) -> Self {
        let n_h = u.neutral_density / config.m_h;
        let n_hplus = (u.density - u.neutral_density) / config.m_h;
        let n_e = n_hplus + u.density * config.alpha_c / (TRACE_ELEMENT_MASS * config.m_h);
        let x = n_e / (n_h + n_hplus);
        let mean_mass = x * 0.5 * config.m_h + (1.0 - x) * config.mu;
        let temperature = (config.gamma - 1.0) * u.thermal_energy() / u.density * mean_mass / config.k_b;
        Self { n_h, n_hplus, n_e, x, mean_mass, temperature }
    }

    /**
     * Thermal energy density of the cell if it were at temperature `t`, with
     * its composition unchanged.
     */
    pub fn thermal_energy_at(&self, density: f64, t: f64, config: &RadiationConfig) -> f64 {
        density * t * config.k_b / (self.mean_mass * (config.gamma - 1.0))
    }
}




/**
 * Tracks the sign of a cell's neutral density rate between calls, counting
 * sign flips. Consecutive calls with the same sign wind the count back down.
 */
#[derive(Clone, Copy, Debug, Default)]
pub struct SignTracker {
    last_sign: i8,
    count: u32,
}




// ============================================================================
impl SignTracker {

    /**
     * Record the latest rate and return the factor by which it should be
     * damped: `DAMPING_FACTOR` raised to the number of flips past
     * `DAMPING_THRESHOLD`.
     */
    pub fn record(&mut self, rate: f64) -> f64 {
        let sign = if rate < 0.0 {
            -1
        } else if rate > 0.0 {
            1
        } else {
            0
        };

        if sign == 0 {
            self.last_sign = 0;
            self.count = 0;
        } else {
            if self.last_sign == -sign {
                self.count += 1
            } else if self.count > 0 {
                self.count -= 1
            }
            self.last_sign = sign;
        }
        DAMPING_FACTOR.powi(self.count.saturating_sub(DAMPING_THRESHOLD) as i32)
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}




#[derive(Clone, Copy, Debug, Default)]
struct Snapshot {
    energy: f64,
    thermal_energy: f64,
    x: f64,
}




/**
 * The per-grid arrays of the rate engine, sized to the grid including its
 * guard cells. Rates are recomputed every sub-cycle iteration; the snapshot
 * is taken once at the start of the sub-cycle.
 */
pub struct RadiationState {
    pub ph_rate: Array3<f64>,
    pub edot: Array3<f64>,
    pub nh_dot: Array3<f64>,
    damping: Array3<f64>,
    signs: Array3<SignTracker>,
    snapshot: Array3<Snapshot>,
}




// ============================================================================
impl RadiationState {

    pub fn new(grid: &Grid) -> Self {
        let space = grid.cells().space().clone();
        Self {
            ph_rate: Array3::filled(space.clone(), 0.0),
            edot: Array3::filled(space.clone(), 0.0),
            nh_dot: Array3::filled(space.clone(), 0.0),
            damping: Array3::filled(space.clone(), 1.0),
            signs: Array3::filled(space.clone(), SignTracker::default()),
            snapshot: Array3::filled(space, Snapshot::default()),
        }
    }

    /**
     * Record the energies and ionization fraction of every cell, against
     * which `check_range` measures the change over the sub-cycle, and clear
     * the oscillation history.
     */
    pub fn save_snapshot(&mut self, grid: &Grid, config: &RadiationConfig) {
        for index in grid.interior().iter() {
            let u = grid.cell(index);
            self.snapshot[index] = Snapshot {
                energy: u.energy,
                thermal_energy: u.thermal_energy(),
                x: Species::from_conserved(u, config).x,
            };
            self.signs[index] = SignTracker::default();
        }
    }

    /**
     * Compute the neutral density rate of every cell and return the largest
     * timestep, over all processes sharing the domain, which keeps the
     * fractional change of the electron and neutral densities within
     * `max_dx_iter`.
     */
    pub fn compute_chem_rates<C: Communicator>(
        &mut self,
        grid: &Grid,
        config: &RadiationConfig,
        collective: &Collective<C>,
    ) -> Result<f64, Error> {
        let f = config.max_dx_iter;
        let mut dt_chem = LARGE;

        for index in grid.interior().iter() {
            let u = grid.cell(index);
            let s = Species::from_conserved(u, config);
            let t = s.temperature.max(config.t_floor);

            let rate = chemistry::recombination_rate(t) * config.time_unit * s.n_e * s.n_hplus
                - self.ph_rate[index] * s.n_h;
            let damping = self.signs[index].record(rate);
            let rate = rate * damping;

            self.damping[index] = damping;
            self.nh_dot[index] = rate;

            let dt = if rate > 0.0 {
                (f / (1.0 + f) * s.n_e / rate).min(f * s.n_h / rate)
            } else if rate < 0.0 && u.neutral_density > FLOOR_TOLERANCE * neutral_floor(u, grid, config) {
                (-f * s.n_e / rate).min(-f / (1.0 + f) * s.n_h / rate)
            } else {
                LARGE
            };

            if dt < 0.0 {
                return Err(Error::NegativeChemicalTimeStep { index, dt, nh_dot: rate });
            }
            dt_chem = dt_chem.min(dt);
        }
        collective.min_f64(dt_chem)
    }

    /**
     * Compute the thermal energy rate of every cell and return the largest
     * timestep, over all processes sharing the domain, which keeps the
     * fractional change of the total and thermal energies within
     * `max_de_iter` and `max_de_therm_iter`. Must follow
     * `compute_chem_rates`, whose damping it applies.
     */
    pub fn compute_therm_rates<C: Communicator>(
        &mut self,
        grid: &Grid,
        config: &RadiationConfig,
        collective: &Collective<C>,
    ) -> Result<f64, Error> {
        let fe = config.max_de_iter;
        let ft = config.max_de_therm_iter;
        let mut dt_therm = LARGE;

        for index in grid.interior().iter() {
            let u = grid.cell(index);
            let s = Species::from_conserved(u, config);

            // Cells below the temperature floor, or ionizing at the neutral
            // floor, are left to the floor corrections.
            if s.temperature < config.t_floor
                || (self.nh_dot[index] < 0.0 && u.neutral_density < FLOOR_TOLERANCE * neutral_floor(u, grid, config))
            {
                self.edot[index] = 0.0;
                continue;
            }
            let t = s.temperature;
            let heating = self.ph_rate[index] * config.e_gamma * s.n_h;
            let cooling = chemistry::recombination_cooling_rate(t, config.k_b) * config.time_unit * s.n_hplus * s.n_e
                + chemistry::lyman_alpha_cooling_rate(s.n_h, s.n_e, t) * config.time_unit;
            let rate = (heating - cooling) * self.damping[index];

            self.edot[index] = rate;

            let e = u.energy;
            let e_th = u.thermal_energy();

            let dt = if rate > 0.0 {
                (fe * e / rate).min(ft * e_th / rate)
            } else if rate < 0.0 {
                let e_th_min = s.thermal_energy_at(u.density, config.t_floor, config);
                let e_min = u.kinetic_energy() + u.magnetic_energy() + e_th_min;

                if e_th / (1.0 + ft) < e_th_min && e / (1.0 + fe) < e_min {
                    LARGE
                } else {
                    (-fe / (1.0 + fe) * e / rate).min(-ft / (1.0 + ft) * e_th / rate)
                }
            } else {
                LARGE
            };
            dt_therm = dt_therm.min(dt);
        }
        collective.min_f64(dt_therm)
    }

    /**
     * Advance the energy and neutral density of every cell by `dt` at the
     * current rates. Cells at the neutral floor which are still being
     * ionized are skipped.
     */
    pub fn ionization_update(&self, grid: &mut Grid, config: &RadiationConfig, dt: f64) {
        for index in grid.interior().iter() {
            let floor = neutral_floor(grid.cell(index), grid, config);
            let nh_dot = self.nh_dot[index];
            let edot = self.edot[index];
            let u = grid.cell_mut(index);

            if nh_dot > 0.0 || u.neutral_density > FLOOR_TOLERANCE * floor {
                u.energy += edot * dt;
                u.neutral_density += nh_dot * dt * config.m_h;
            }
        }
    }

    /**
     * Count the cells (over all processes sharing the domain) whose thermal
     * energy, total energy, or ionization fraction has changed since the
     * snapshot by more than the per-step limits, skipping cells in the
     * D-type saturated regime. Returns true if there are more than
     * `max_cell_count` such cells, meaning the sub-cycle should stop.
     */
    pub fn check_range<C: Communicator>(
        &self,
        grid: &Grid,
        config: &RadiationConfig,
        collective: &Collective<C>,
    ) -> Result<bool, Error> {
        let min_area = grid.min_face_area();
        let mut count = 0;

        for index in grid.interior().iter() {
            let u = grid.cell(index);
            let s = Species::from_conserved(u, config);

            if self.ph_rate[index] / (min_area * s.n_h) > 2.0 * config.critical_ionization {
                continue;
            }
            let snap = &self.snapshot[index];

            if (config.max_de_therm_step > 0.0 && out_of_range(u.thermal_energy(), snap.thermal_energy, config.max_de_therm_step))
                || (config.max_de_step > 0.0 && out_of_range(u.energy, snap.energy, config.max_de_step))
                || (config.max_dx_step > 0.0 && out_of_range(s.x, snap.x, config.max_dx_step))
            {
                count += 1
            }
        }
        Ok(collective.sum_u64(count)? > config.max_cell_count)
    }
}




/**
 * Reset the total energy of cells colder than `t_floor` (or hotter than
 * `t_ceil`, if it is positive) to the value at that temperature, keeping
 * the kinetic and magnetic energy.
 */
pub fn apply_temperature_floor(grid: &mut Grid, config: &RadiationConfig) {
    for index in grid.interior().iter() {
        let u = grid.cell_mut(index);
        let s = Species::from_conserved(u, config);

        let target = if s.temperature < config.t_floor {
            config.t_floor
        } else if config.t_ceil > 0.0 && s.temperature > config.t_ceil {
            config.t_ceil
        } else {
            continue;
        };
        u.energy = u.kinetic_energy() + u.magnetic_energy() + s.thermal_energy_at(u.density, target, config);
    }
}

/**
 * Clamp the neutral density of every cell between its floor and the total
 * density.
 */
pub fn apply_neutral_floor(grid: &mut Grid, config: &RadiationConfig) {
    for index in grid.interior().iter() {
        let floor = neutral_floor(grid.cell(index), grid, config);
        let u = grid.cell_mut(index);

        if u.neutral_density < floor {
            u.neutral_density = floor
        } else if u.neutral_density > u.density {
            u.neutral_density = u.density
        }
    }
}

/**
 * The smallest neutral density a cell may have: the lesser of the configured
 * fraction of its density and the density which makes the cell optically
 * thin at `min_opt_depth`.
 */
pub fn neutral_floor(u: &Conserved, grid: &Grid, config: &RadiationConfig) -> f64 {
    (u.density * config.ion_frac_floor).min(config.floor_density(grid.min_spacing()))
}

fn out_of_range(now: f64, then: f64, limit: f64) -> bool {
    now / then >= 1.0 + limit || then / now >= 1.0 + limit
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::index_space::IndexSpace3;
    use crate::message::comm::{Group, Tag};
    use crate::message::local::LocalCommunicator;

    fn neutral_gas(config: &RadiationConfig, n_h: f64, t: f64) -> Conserved {
        let mut u = Conserved { density: n_h * config.m_h, neutral_density: n_h * config.m_h, ..Default::default() };
        let s = Species::from_conserved(&u, config);
        u.energy = s.thermal_energy_at(u.density, t, config);
        u
    }

    fn uniform_grid(config: &RadiationConfig, t: f64) -> Grid {
        let mut grid = Grid::new(0, 0, 0, IndexSpace3::new(0..4, 0..3, 0..3), [1e16; 3], 2);
        let u = neutral_gas(config, 10.0, t);
        grid.set_interior(|_| u);
        grid
    }

    fn with_collective<F: FnOnce(&Collective<LocalCommunicator>)>(f: F) {
        let comm = LocalCommunicator::group(1).remove(0);
        let collective = Collective::new(&comm, Group::world(1), Tag::Collective { level: 0, domain: 0 });
        f(&collective)
    }

    #[test]
    fn temperature_of_neutral_gas_round_trips() {
        let config = RadiationConfig::default();
        let u = neutral_gas(&config, 10.0, 100.0);
        assert!((Species::from_conserved(&u, &config).temperature - 100.0).abs() < 1e-9);
    }

    #[test]
    fn temperature_floor_is_idempotent() {
        let config = RadiationConfig { t_floor: 50.0, t_ceil: 1e4, ..Default::default() };
        let mut grid = uniform_grid(&config, 20.0);
        grid.cell_mut((1, 1, 1)).momentum = [1e-20, 0.0, 0.0];
        grid.cell_mut((2, 1, 1)).energy *= 1e4;

        apply_temperature_floor(&mut grid, &config);
        let once: Vec<f64> = grid.cells().values().map(|u| u.energy).collect();
        apply_temperature_floor(&mut grid, &config);
        let twice: Vec<f64> = grid.cells().values().map(|u| u.energy).collect();
        assert_eq!(once, twice);

        let t = Species::from_conserved(grid.cell((0, 0, 0)), &config).temperature;
        assert!((t - 50.0).abs() < 1e-9);
        let t = Species::from_conserved(grid.cell((2, 1, 1)), &config).temperature;
        assert!((t - 1e4).abs() < 1e-6);
        let u = grid.cell((1, 1, 1));
        assert!(u.thermal_energy() > 0.0);
    }

    #[test]
    fn neutral_floor_holds_in_every_cell() {
        let config = RadiationConfig::default();
        let mut grid = uniform_grid(&config, 100.0);
        grid.cell_mut((0, 0, 0)).neutral_density = -1.0;
        grid.cell_mut((1, 0, 0)).neutral_density = 0.0;
        grid.cell_mut((2, 0, 0)).neutral_density *= 2.0;

        apply_neutral_floor(&mut grid, &config);

        for index in grid.interior().iter() {
            let u = grid.cell(index);
            let floor = (config.ion_frac_floor * u.density).min(config.floor_density(1e16));
            assert!(u.neutral_density > 0.0);
            assert!(u.neutral_density <= u.density);
            assert!(u.neutral_density >= floor);
        }
    }

    #[test]
    fn damping_halves_the_rate_per_excess_flip() {
        let mut tracker = SignTracker::default();
        let factors: Vec<f64> = (0..9).map(|n| tracker.record(if n % 2 == 0 { 1.0 } else { -1.0 })).collect();
        assert_eq!(factors, vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.25, 0.125, 0.0625]);

        // A repeated sign winds the count down, a zero rate clears it
        assert_eq!(tracker.record(1.0), 0.125);
        assert_eq!(tracker.record(0.0), 1.0);
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn photoionization_drives_neutral_density_down() {
        let config = RadiationConfig { alpha_c: 1e-3, ..Default::default() };
        let mut grid = uniform_grid(&config, 100.0);
        let mut state = RadiationState::new(&grid);

        with_collective(|collective| {
            let dt = state.compute_chem_rates(&grid, &config, collective).unwrap();
            assert_eq!(dt, LARGE);
            state.ph_rate.fill(1e-8);
            let dt = state.compute_chem_rates(&grid, &config, collective).unwrap();
            let dt_therm = state.compute_therm_rates(&grid, &config, collective).unwrap();
            assert!(dt > 0.0 && dt < LARGE);
            assert!(dt_therm > 0.0);
            assert!(state.nh_dot[(0, 0, 0)] < 0.0);
            assert!(state.edot[(0, 0, 0)] > 0.0);

            let before = *grid.cell((0, 0, 0));
            state.ionization_update(&mut grid, &config, dt);
            let after = *grid.cell((0, 0, 0));
            assert!(after.neutral_density < before.neutral_density);
            assert!(after.energy > before.energy);

            // The electron density changes by at most the allowed fraction
            let x0 = Species::from_conserved(&before, &config).n_e;
            let x1 = Species::from_conserved(&after, &config).n_e;
            assert!(x1 / x0 <= 1.0 + config.max_dx_iter + 1e-9);
        });
    }

    #[test]
    fn cells_at_the_floor_are_not_ionized_further() {
        let config = RadiationConfig::default();
        let mut grid = uniform_grid(&config, 100.0);
        let floor = neutral_floor(grid.cell((0, 0, 0)), &grid, &config);
        grid.cell_mut((0, 0, 0)).neutral_density = floor;
        let mut state = RadiationState::new(&grid);

        let s = Species::from_conserved(grid.cell((0, 0, 0)), &config);
        assert!(s.temperature > config.t_floor);

        with_collective(|collective| {
            // Nearly all ionized, the cell recombines unless the photo rate
            // beats recombination
            state.compute_chem_rates(&grid, &config, collective).unwrap();
            let recombination = state.nh_dot[(0, 0, 0)];
            assert!(recombination > 0.0);

            state.save_snapshot(&grid, &config);
            state.ph_rate.fill(10.0 * recombination / s.n_h);
            state.compute_chem_rates(&grid, &config, collective).unwrap();
            state.compute_therm_rates(&grid, &config, collective).unwrap();
        });
        assert!(state.nh_dot[(0, 0, 0)] < 0.0);
        assert_eq!(state.edot[(0, 0, 0)], 0.0);
        assert!(state.edot[(1, 0, 0)] > 0.0);

        let before = *grid.cell((0, 0, 0));
        state.ionization_update(&mut grid, &config, 1.0);
        assert_eq!(*grid.cell((0, 0, 0)), before);
    }

    #[test]
    fn flipping_cell_has_its_rates_damped() {
        let config = RadiationConfig::default();
        let mut grid = uniform_grid(&config, 100.0);
        grid.set_interior(|_| {
            let mut u = neutral_gas(&config, 10.0, 100.0);
            u.neutral_density *= 0.5;
            u
        });
        let mut state = RadiationState::new(&grid);
        state.save_snapshot(&grid, &config);

        let expected = [1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.25, 0.125];

        with_collective(|collective| {
            for (n, factor) in expected.iter().enumerate() {
                let ph_rate = if n % 2 == 0 { 1e-6 } else { 0.0 };
                let mut fresh = RadiationState::new(&grid);

                for rates in [&mut state, &mut fresh].iter_mut() {
                    rates.ph_rate.fill(ph_rate);
                    rates.compute_chem_rates(&grid, &config, collective).unwrap();
                    rates.compute_therm_rates(&grid, &config, collective).unwrap();
                }
                let index = (1, 1, 1);
                assert_eq!(fresh.nh_dot[index] < 0.0, n % 2 == 0);
                assert_ne!(fresh.edot[index], 0.0);
                assert_eq!(state.nh_dot[index], fresh.nh_dot[index] * factor);
                assert_eq!(state.edot[index], fresh.edot[index] * factor);
            }
        });
    }

    #[test]
    fn range_check_counts_out_of_range_cells() {
        let config = RadiationConfig { max_cell_count: 3, ..Default::default() };

        for (num_hot, expected) in [(3, false), (4, true)].iter() {
            let mut grid = uniform_grid(&config, 100.0);
            let mut state = RadiationState::new(&grid);
            state.save_snapshot(&grid, &config);

            for index in grid.interior().iter().take(*num_hot) {
                grid.cell_mut(index).energy *= 1.0 + 2.0 * config.max_de_therm_step;
            }
            with_collective(|collective| {
                assert_eq!(state.check_range(&grid, &config, collective).unwrap(), *expected);
            });
        }
    }
}
