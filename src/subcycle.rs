use log::{info, warn};
use crate::cfl;
use crate::config::RadiationConfig;
use crate::error::Error;
use crate::geometry::PlaneSource;
use crate::grid::Grid;
use crate::mesh::Layout;
use crate::message::comm::{Collective, Communicator, Group, Tag};
use crate::ray;
use crate::rates::{self, RadiationState};




/// How a sub-cycle sequence ended.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The root level advanced through the whole hydrodynamic timestep
    HydroBudgetExhausted,
    /// A refined level caught up with the coarse-time budget
    CoarseBudgetExhausted,
    /// Too many cells changed too much since the start of the sequence
    RangeExceeded,
    /// The hydrodynamic timestep fell below the time already advanced
    CflLimited,
    /// The iteration cap was hit first; the time advanced is accepted anyway
    MaxIterReached,
}




/// The time a sub-cycle sequence may advance. The root level is bounded by
/// the hydrodynamic timestep and refined levels by the coarse-time budget.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Budget {
    Hydro(f64),
    Coarse(f64),
}

impl Budget {
    pub fn value(&self) -> f64 {
        match self {
            Budget::Hydro(dt) => *dt,
            Budget::Coarse(dt) => *dt,
        }
    }
}




/// Diagnostics from one sub-cycle sequence on one grid.
///
#[derive(Clone, Copy, Debug)]
pub struct SubcycleReport {
    pub iterations: usize,
    /// Number of steps bounded by the thermal timestep
    pub thermal_steps: usize,
    /// Number of steps bounded by the chemical timestep
    pub chemical_steps: usize,
    /// Time advanced, pinned to the budget when the budget is met
    pub elapsed: f64,
    /// Sum of the sub-steps passed to the ionization update
    pub applied: f64,
    /// The new grid timestep
    pub dt: f64,
    pub outcome: Outcome,
}




/// Everything the controller needs to advance one grid, bundled so the call
/// sites read the same on every level.
///
pub struct Subcycle<'a, C: Communicator> {
    pub config: &'a RadiationConfig,
    pub source: PlaneSource,
    /// Flux written into the entry plane; only the root level has one
    pub source_flux: Option<f64>,
    pub layout: &'a Layout,
    pub comm: &'a C,
}




// ============================================================================
impl<'a, C: Communicator> Subcycle<'a, C> {

    /**
     * Run the chemistry and thermal update on one grid in steps no larger
     * than the rate engine allows until one of the stop conditions is met.
     * The grid's flux field must already hold the entry flux for refined
     * levels.
     */
    pub fn run(&self, grid: &mut Grid, state: &mut RadiationState, budget: Budget) -> Result<SubcycleReport, Error> {
        let config = self.config;
        let level = grid.level();
        let domain = grid.domain();
        let collective = Collective::new(self.comm, self.layout.group(), Tag::Collective { level, domain });

        rates::apply_temperature_floor(grid, config);
        rates::apply_neutral_floor(grid, config);
        state.save_snapshot(grid, config);

        let mut iterations = 0;
        let mut thermal_steps = 0;
        let mut chemical_steps = 0;
        let mut elapsed = 0.0;
        let mut applied = 0.0;
        let mut outcome = None;

        while iterations < config.max_iter {
            iterations += 1;

            state.ph_rate.fill(0.0);
            ray::propagate(grid, self.layout, state, self.source.face, self.source_flux, config, self.comm)?;

            let dt_chem = state.compute_chem_rates(grid, config, &collective)?;
            let dt_therm = state.compute_therm_rates(grid, config, &collective)?;
            let mut dt = dt_chem.min(dt_therm);

            if dt_chem < dt_therm {
                chemical_steps += 1
            } else {
                thermal_steps += 1
            }

            let remaining = budget.value() - elapsed;
            let done = dt >= remaining;

            if done {
                dt = remaining
            }

            state.ionization_update(grid, config, dt);
            applied += dt;
            elapsed = if done { budget.value() } else { elapsed + dt };
            rates::apply_temperature_floor(grid, config);
            rates::apply_neutral_floor(grid, config);

            match budget {
                Budget::Hydro(_) => {
                    if state.check_range(grid, config, &collective)? {
                        outcome = Some(Outcome::RangeExceeded)
                    } else if done {
                        outcome = Some(Outcome::HydroBudgetExhausted)
                    } else if cfl::hydro_time_step(grid, config, &collective)? < elapsed {
                        outcome = Some(Outcome::CflLimited)
                    }
                }
                Budget::Coarse(_) => {
                    if done {
                        outcome = Some(Outcome::CoarseBudgetExhausted)
                    }
                }
            }
            if outcome.is_some() {
                break;
            }
        }

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                warn!(
                    "level {} domain {}: radiation sub-cycle stopped at {} iterations, accepting dt = {:e}",
                    level, domain, iterations, elapsed
                );
                Outcome::MaxIterReached
            }
        };

        if elapsed < 0.0 {
            return Err(Error::NegativeTimeStep { level, domain, dt: elapsed });
        }
        grid.dt = elapsed;

        info!(
            "radiation done in {} iterations: {} thermal, {} chemical; new dt = {:e}",
            iterations, thermal_steps, chemical_steps, elapsed
        );

        Ok(SubcycleReport {
            iterations,
            thermal_steps,
            chemical_steps,
            elapsed,
            applied,
            dt: elapsed,
            outcome,
        })
    }
}




/// The simulation time advanced by the root level in the current hydrodynamic
/// step. Written by the root level's sub-cycle, made consistent across
/// processes by `synchronize`, then read as the budget of every refined level.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct CoarseTime {
    value: f64,
}

impl CoarseTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Zero the local value at the start of a root-level sub-cycle, so a
    /// shorter step never inherits the budget of the previous one.
    ///
    pub fn clear(&mut self) {
        self.value = 0.0
    }

    pub fn publish(&mut self, elapsed: f64) {
        self.value = elapsed
    }

    /// Replace the local value with the largest value published by any
    /// process. Every process must call this before reading the budget.
    ///
    pub fn synchronize<C: Communicator>(&mut self, comm: &C) -> Result<f64, Error> {
        self.value = comm.max_f64(&Group::world(comm.size()), Tag::World, self.value)?;
        Ok(self.value)
    }

    /// Zero the budget for the next hydrodynamic step, after every process
    /// is done reading it.
    ///
    pub fn reset<C: Communicator>(&mut self, comm: &C) -> Result<(), Error> {
        comm.barrier(&Group::world(comm.size()), Tag::World)?;
        self.value = 0.0;
        Ok(())
    }
}
