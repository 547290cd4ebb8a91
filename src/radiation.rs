use std::collections::HashMap;
use log::{debug, info};
use crate::bvals::apply_flux_boundaries;
use crate::config::RadiationConfig;
use crate::error::Error;
use crate::geometry::{Face, PlaneSource};
use crate::mesh::Mesh;
use crate::message::comm::Communicator;
use crate::rates::RadiationState;
use crate::subcycle::{Budget, CoarseTime, Subcycle, SubcycleReport};
use crate::sync::{self, Mailbox};




/**
 * The ionizing radiation module as seen by the host: owns the rate engine
 * state of every grid on this process, the coarse-time budget, and the
 * mailbox for flux faces moving between grids on the same process.
 */
pub struct IonRadiation {
    config: RadiationConfig,
    states: HashMap<(usize, usize), RadiationState>,
    coarse_time: CoarseTime,
    mailbox: Mailbox,
}




// ============================================================================
impl IonRadiation {

    pub fn new(config: RadiationConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            states: HashMap::new(),
            coarse_time: CoarseTime::new(),
            mailbox: Mailbox::new(),
        })
    }

    pub fn config(&self) -> &RadiationConfig {
        &self.config
    }

    pub fn coarse_time(&self) -> f64 {
        self.coarse_time.value()
    }

    /**
     * The rate engine state of the grid this process holds for the given
     * domain, if any.
     */
    pub fn state(&self, level: usize, domain: usize) -> Option<&RadiationState> {
        self.states.get(&(level, domain))
    }

    /**
     * Allocate the rate arrays of every grid held by this process. The
     * module only handles three-dimensional grids, at least two cells wide
     * on every axis.
     */
    pub fn initialize_for_mesh(&mut self, mesh: &Mesh) -> Result<(), Error> {
        for grid in mesh.grids() {
            let size = grid.size();

            if size.iter().any(|&n| n < 2) {
                return Err(Error::UnsupportedDimension(size));
            }
            self.states.insert((grid.level(), grid.domain()), RadiationState::new(grid));
        }
        debug!("[{}] radiation state allocated for {} grids", mesh.rank(), self.states.len());
        Ok(())
    }

    /**
     * Register the plane source of the mesh, given by a direction code (see
     * `Face::from_code`) and the photon number flux through the source
     * plane. Only one source may be registered.
     */
    pub fn add_source(&self, mesh: &mut Mesh, code: i32, flux: f64) -> Result<(), Error> {
        let face = Face::from_code(code)?;

        if mesh.source.is_some() {
            return Err(Error::SourceAlreadyRegistered);
        }
        mesh.source = Some(PlaneSource { face, flux });
        mesh.allocate_faces(face);
        info!("plane source with flux {:e} on face {:?}", flux, face);
        Ok(())
    }

    /**
     * Run one sub-cycle sequence on the grid this process holds for the
     * given domain. Refined grids first collect their entry flux from their
     * parents and are bounded by the coarse-time budget; the root grid is
     * bounded by the mesh timestep, clears the coarse-time budget on entry
     * and publishes the time it advanced. The mesh timestep is set to the
     * new grid timestep, and the final flux is handed to any children.
     */
    pub fn advance_radiation<C: Communicator>(
        &mut self,
        mesh: &mut Mesh,
        level: usize,
        number: usize,
        comm: &C,
    ) -> Result<SubcycleReport, Error> {
        let source = mesh
            .source
            .ok_or_else(|| Error::InvalidConfig("no radiation source is registered".into()))?;
        let face = source.face;
        let (source_flux, budget) = if level == 0 {
            (Some(self.config.ramped_flux(source.flux, mesh.time)), Budget::Hydro(mesh.dt))
        } else {
            (None, Budget::Coarse(self.coarse_time.value()))
        };

        let domain = mesh.domain_mut(level, number).ok_or(Error::NoGrid { level, domain: number })?;
        let layout = domain.layout().clone();
        let grid = domain.grid.as_mut().ok_or(Error::NoGrid { level, domain: number })?;
        let state = self.states.get_mut(&(level, number)).ok_or(Error::NoGrid { level, domain: number })?;

        if level == 0 {
            self.coarse_time.clear();
        } else {
            sync::receive_from_parents(grid, face, &mut self.mailbox, comm)?;
        }
        let subcycle = Subcycle { config: &self.config, source, source_flux, layout: &layout, comm };
        let report = subcycle.run(grid, state, budget)?;

        if level == 0 {
            self.coarse_time.publish(report.dt);
        }
        if !grid.children.is_empty() {
            sync::send_to_children(grid, face, &mut self.mailbox, comm)?;
        }
        mesh.dt = report.dt;
        Ok(report)
    }

    /**
     * Advance the radiation on every grid of this process through one
     * hydrodynamic step, coarse to fine: reset the coarse-time budget, apply
     * the flux boundary rules, run the root level, make the budget agree
     * across processes, then run each refined level. Every process must
     * call this together.
     */
    pub fn advance_mesh<C: Communicator>(&mut self, mesh: &mut Mesh, comm: &C) -> Result<Vec<SubcycleReport>, Error> {
        let mut reports = Vec::new();

        self.coarse_time.reset(comm)?;

        for grid in mesh.grids_mut() {
            apply_flux_boundaries(grid)
        }
        for level in 0..mesh.num_levels() {
            if level == 1 {
                let budget = self.coarse_time.synchronize(comm)?;
                debug!("[{}] coarse-time budget {:e}", comm.rank(), budget);
            }
            for number in 0..mesh.domains(level).len() {
                if mesh.grid(level, number).is_some() {
                    reports.push(self.advance_radiation(mesh, level, number, comm)?)
                }
            }
        }
        if mesh.num_levels() == 1 {
            self.coarse_time.synchronize(comm)?;
        }
        Ok(reports)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::grid::Conserved;
    use crate::index_space::IndexSpace3;
    use crate::mesh::{DomainSpec, Layout};
    use crate::message::local::{run_group, LocalCommunicator};
    use crate::rates::Species;
    use crate::subcycle::Outcome;

    fn fill_neutral(mesh: &mut Mesh, config: &RadiationConfig, n_h: f64, t: f64) {
        let mut u = Conserved { density: n_h * config.m_h, neutral_density: n_h * config.m_h, ..Default::default() };
        u.energy = Species::from_conserved(&u, config).thermal_energy_at(u.density, t, config);

        for grid in mesh.grids_mut() {
            grid.set_interior(|_| u)
        }
    }

    fn root_only(region: IndexSpace3) -> Mesh {
        let specs = vec![DomainSpec { level: 0, region, layout: Layout::single(0) }];
        Mesh::new([1e16; 3], 2, specs, 0, 1).unwrap()
    }

    #[test]
    fn only_one_source_may_be_registered() {
        let radiation = IonRadiation::new(RadiationConfig::default()).unwrap();
        let mut mesh = root_only(IndexSpace3::new(0..4, 0..4, 0..4));
        assert!(matches!(radiation.add_source(&mut mesh, 4, 1e9), Err(Error::UnsupportedDirection(4))));
        assert!(radiation.add_source(&mut mesh, -1, 1e9).is_ok());
        assert!(matches!(radiation.add_source(&mut mesh, 2, 1e9), Err(Error::SourceAlreadyRegistered)));
    }

    #[test]
    fn flat_grids_are_rejected() {
        let mut radiation = IonRadiation::new(RadiationConfig::default()).unwrap();
        let mesh = root_only(IndexSpace3::new(0..4, 0..4, 0..1));
        assert!(matches!(radiation.initialize_for_mesh(&mesh), Err(Error::UnsupportedDimension([4, 4, 1]))));
    }

    #[test]
    fn advancing_without_a_source_fails() {
        let mut radiation = IonRadiation::new(RadiationConfig::default()).unwrap();
        let mut mesh = root_only(IndexSpace3::new(0..4, 0..4, 0..4));
        let comm = LocalCommunicator::group(1).remove(0);
        radiation.initialize_for_mesh(&mesh).unwrap();
        assert!(radiation.advance_mesh(&mut mesh, &comm).is_err());
    }

    #[test]
    fn d_type_front_single_process() {
        let config = RadiationConfig { sigma_ph: 6e-18, ramp_time: 0.0, max_iter: 1, ..Default::default() };
        let mut radiation = IonRadiation::new(config.clone()).unwrap();
        let mut mesh = root_only(IndexSpace3::new(0..8, 0..4, 0..4));
        let comm = LocalCommunicator::group(1).remove(0);

        fill_neutral(&mut mesh, &config, 10.0, 100.0);
        radiation.initialize_for_mesh(&mesh).unwrap();
        radiation.add_source(&mut mesh, -1, 1e9).unwrap();
        mesh.dt = 1e4;

        let reports = radiation.advance_mesh(&mut mesh, &comm).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].dt > 0.0 && reports[0].dt <= 1e4);
        assert_eq!(mesh.dt, reports[0].dt);
        assert_eq!(radiation.coarse_time(), reports[0].dt);

        let grid = mesh.grid(0, 0).unwrap();
        let state = radiation.state(0, 0).unwrap();
        let expected = 1e9 * (-config.sigma_ph * 10.0 * 1e16).exp();
        assert!(state.ph_rate[(0, 1, 1)] > 0.0);
        assert!((grid.flux[(1, 1, 1)] / expected - 1.0).abs() < 1e-9);
    }

    #[test]
    fn shorter_root_step_replaces_the_coarse_time_budget() {
        let config = RadiationConfig { sigma_ph: 6e-18, ramp_time: 0.0, ..Default::default() };
        let mut radiation = IonRadiation::new(config.clone()).unwrap();
        let mut mesh = root_only(IndexSpace3::new(0..8, 0..4, 0..4));
        let comm = LocalCommunicator::group(1).remove(0);

        fill_neutral(&mut mesh, &config, 10.0, 100.0);
        radiation.initialize_for_mesh(&mesh).unwrap();
        radiation.add_source(&mut mesh, -1, 1e9).unwrap();

        mesh.dt = 1e4;
        let first = radiation.advance_radiation(&mut mesh, 0, 0, &comm).unwrap();
        assert_eq!(radiation.coarse_time(), first.dt);

        mesh.time += first.dt;
        mesh.dt = 1.0;
        let second = radiation.advance_radiation(&mut mesh, 0, 0, &comm).unwrap();
        assert!(second.dt <= 1.0);
        assert!(second.dt < first.dt);
        assert_eq!(radiation.coarse_time(), second.dt);
    }

    #[test]
    fn unknown_domain_is_an_error() {
        let mut radiation = IonRadiation::new(RadiationConfig::default()).unwrap();
        let mut mesh = root_only(IndexSpace3::new(0..4, 0..4, 0..4));
        let comm = LocalCommunicator::group(1).remove(0);
        radiation.initialize_for_mesh(&mesh).unwrap();
        radiation.add_source(&mut mesh, -1, 1e9).unwrap();
        assert!(matches!(radiation.advance_radiation(&mut mesh, 3, 0, &comm), Err(Error::NoGrid { level: 3, domain: 0 })));
        assert!(matches!(radiation.advance_radiation(&mut mesh, 0, 5, &comm), Err(Error::NoGrid { level: 0, domain: 5 })));
    }

    #[test]
    fn two_level_step_over_two_processes() {
        let config = RadiationConfig { sigma_ph: 6e-18, ramp_time: 0.0, ..Default::default() };

        let results = run_group(2, |comm| {
            let specs = vec![
                DomainSpec {
                    level: 0,
                    region: IndexSpace3::new(0..8, 0..8, 0..8),
                    layout: Layout::new([2, 1, 1], vec![0, 1]).unwrap(),
                },
                DomainSpec { level: 1, region: IndexSpace3::new(4..12, 4..12, 4..12), layout: Layout::single(1) },
            ];
            let mut mesh = Mesh::new([1e16; 3], 2, specs, comm.rank(), 2).unwrap();
            let mut radiation = IonRadiation::new(config.clone()).unwrap();

            fill_neutral(&mut mesh, &config, 10.0, 100.0);
            radiation.initialize_for_mesh(&mesh).unwrap();
            radiation.add_source(&mut mesh, -1, 1e9).unwrap();
            mesh.dt = 1e3;

            let reports = radiation.advance_mesh(&mut mesh, &comm).unwrap();
            let entry = mesh.grid(1, 0).map(|grid| grid.flux[(-1, 0, 0)]);
            (reports, radiation.coarse_time(), entry)
        })
        .unwrap();

        let (coarse0, budget0, entry0) = &results[0];
        let (reports1, budget1, entry1) = &results[1];
        assert_eq!(budget0, budget1);
        assert_eq!(coarse0.len(), 1);
        assert_eq!(reports1.len(), 2);
        assert_eq!(coarse0[0].dt, reports1[0].dt);
        assert_eq!(reports1[1].outcome, Outcome::CoarseBudgetExhausted);
        assert!((reports1[1].dt - budget1).abs() <= 1e-12 * budget1);
        assert!(entry0.is_none());
        assert!(entry1.unwrap() > 0.0);
    }
}
