use log::debug;
use crate::config::RadiationConfig;
use crate::error::Error;
use crate::geometry::{Face, Side};
use crate::grid::Grid;
use crate::mesh::Layout;
use crate::message::comm::{Collective, Communicator, Tag};
use crate::patch::FluxPatch;
use crate::rates::RadiationState;




/**
 * Position of a grid along the march axis of its domain, counted from the
 * source: stage zero receives the radiation first. The domain layout may
 * split the march axis over several processes, which then form a pipeline.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    pub number: usize,
    pub count: usize,
}




// ============================================================================
impl Stage {

    pub fn of_block(layout: &Layout, block: usize, face: Face) -> Self {
        let m = face.axis.index();
        let count = layout.blocks()[m];
        let coord = layout.block_coords(block)[m];
        let number = match face.side {
            Side::Lower => coord,
            Side::Upper => count - 1 - coord,
        };
        Self { number, count }
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        self.number + 1 == self.count
    }
}




/**
 * Local index, along the march axis of a grid `n` cells long, of the cell
 * reached after `step` steps from the source side.
 */
fn march_index(face: Face, n: i64, step: i64) -> i64 {
    match face.side {
        Side::Lower => step,
        Side::Upper => n - 1 - step,
    }
}

/**
 * Local index of the ghost layer through which radiation enters a grid.
 */
pub fn upstream_ghost(face: Face, n: i64) -> i64 {
    match face.side {
        Side::Lower => -1,
        Side::Upper => n,
    }
}

/**
 * Local index of the ghost layer through which radiation leaves a grid.
 */
pub fn downstream_ghost(face: Face, n: i64) -> i64 {
    match face.side {
        Side::Lower => n,
        Side::Upper => -1,
    }
}




/**
 * Fill the upstream ghost plane of a grid with a uniform flux.
 */
pub fn set_entry_flux(grid: &mut Grid, face: Face, flux: f64) {
    let m = face.axis;
    let ghost = upstream_ghost(face, grid.size()[m.index()]);
    let plane = grid.interior().transverse(m);

    for (a, b) in plane.iter() {
        grid.flux[m.compose(ghost, a, b)] = flux
    }
}




/**
 * March the flux through every line of cells of one grid, starting from the
 * values in the upstream ghost plane. Each cell's incident flux is stored in
 * the flux field, its photoionization rate is accumulated into `ph_rate`,
 * and the transmitted flux is written to the downstream ghost plane. A line
 * is cut short once the transmitted fraction of its entry flux falls below
 * `min_flux_frac`. Returns the largest transmitted fraction of any line.
 */
pub fn march(grid: &mut Grid, state: &mut RadiationState, face: Face, config: &RadiationConfig) -> f64 {
    let m = face.axis;
    let n = grid.size()[m.index()];
    let len = grid.cell_length(m);
    let entry_ghost = upstream_ghost(face, n);
    let exit_ghost = downstream_ghost(face, n);
    let plane = grid.interior().transverse(m);
    let mut max_frac: f64 = 0.0;

    for (a, b) in plane.iter() {
        for c in 0..n {
            grid.flux[m.compose(c, a, b)] = 0.0
        }
        let entry = grid.flux[m.compose(entry_ghost, a, b)];
        let mut flux = entry;

        for step in 0..n {
            let index = m.compose(march_index(face, n, step), a, b);
            let n_h = grid.cell(index).neutral_density / config.m_h;
            let tau = config.sigma_ph * n_h * len;
            let transmitted = (-tau).exp();

            grid.flux[index] = flux;

            if n_h > 0.0 {
                state.ph_rate[index] += flux * (1.0 - transmitted) / (n_h * len);
            }
            flux *= transmitted;

            let frac = if entry > 0.0 { flux / entry } else { 0.0 };

            if frac < config.min_flux_frac {
                flux = 0.0;
                break;
            }
        }
        grid.flux[m.compose(exit_ghost, a, b)] = flux;

        if entry > 0.0 {
            max_frac = max_frac.max(flux / entry)
        }
    }
    max_frac
}




/**
 * Integrate the radiation through one grid of a domain whose layout may split
 * the march axis over several processes. Every process of the domain must
 * call this together. Stages run strictly in order from the source: each
 * waits for the exit plane of the stage upstream of it, marches its lines,
 * and hands its own exit plane downstream. After each stage the largest
 * transmitted fraction is max-reduced over the domain, and the pipeline
 * stops early once it is below `min_flux_frac`; stages that never run keep
 * zero flux.
 *
 * `source_flux`, when given, is written into the entry plane of the first
 * stage; otherwise the first stage marches from whatever its upstream ghost
 * plane already holds (the flux handed down from a parent grid).
 */
pub fn propagate<C: Communicator>(
    grid: &mut Grid,
    layout: &Layout,
    state: &mut RadiationState,
    face: Face,
    source_flux: Option<f64>,
    config: &RadiationConfig,
    comm: &C,
) -> Result<(), Error> {
    let level = grid.level();
    let domain = grid.domain();
    let stage = Stage::of_block(layout, grid.block(), face);
    let collective = Collective::new(comm, layout.group(), Tag::Collective { level, domain });

    if stage.count == 1 {
        if let Some(flux) = source_flux {
            set_entry_flux(grid, face, flux)
        }
        march(grid, state, face, config);
        return Ok(());
    }
    clear(grid, face);

    for s in 0..stage.count {
        let frac = if stage.number == s {
            if stage.is_first() {
                if let Some(flux) = source_flux {
                    set_entry_flux(grid, face, flux)
                }
            } else {
                let upstream = neighbor(layout, grid.block(), face, -1);
                let tag = Tag::Pipeline { level, domain, stage: s };
                let patch = FluxPatch::from_bytes(&comm.recv(upstream, tag)?)?;
                receive_entry_plane(grid, face, &patch)?;
                debug!("[{}] level {} domain {}: stage {} received flux from {}", comm.rank(), level, domain, s, upstream);
            }
            march(grid, state, face, config)
        } else {
            0.0
        };

        let frac = collective.max_f64(frac)?;

        if frac < config.min_flux_frac {
            debug!("level {} domain {}: flux exhausted after stage {} of {}", level, domain, s, stage.count);
            break;
        }
        if stage.number == s && !stage.is_last() {
            let downstream = neighbor(layout, grid.block(), face, 1);
            let tag = Tag::Pipeline { level, domain, stage: s + 1 };
            comm.send(downstream, tag, exit_plane(grid, face).to_bytes()?)?;
        }
    }
    Ok(())
}




/**
 * Zero the incident flux of every interior cell and the downstream ghost
 * plane, leaving the upstream ghost plane alone.
 */
fn clear(grid: &mut Grid, face: Face) {
    let m = face.axis;
    let n = grid.size()[m.index()];
    let exit_ghost = downstream_ghost(face, n);
    let plane = grid.interior().transverse(m);

    for (a, b) in plane.iter() {
        for c in 0..n {
            grid.flux[m.compose(c, a, b)] = 0.0
        }
        grid.flux[m.compose(exit_ghost, a, b)] = 0.0
    }
}

/**
 * The rank owning the block `offset` stages downstream (or upstream, if
 * negative) of the given block.
 */
fn neighbor(layout: &Layout, block: usize, face: Face, offset: i64) -> usize {
    let m = face.axis.index();
    let mut coords = layout.block_coords(block);
    let step = offset * face.inward();
    coords[m] = (coords[m] as i64 + step) as usize;
    layout.rank_of(layout.block_index(coords))
}

/**
 * The downstream ghost plane of a grid as a patch over the grid's transverse
 * extent, in global coordinates of its level.
 */
fn exit_plane(grid: &Grid, face: Face) -> FluxPatch {
    let m = face.axis;
    let ghost = downstream_ghost(face, grid.size()[m.index()]);
    let (_, a0, b0) = m.decompose(grid.to_global((0, 0, 0)));

    FluxPatch::from_function(grid.level(), grid.region().transverse(m), |(a, b)| {
        grid.flux[m.compose(ghost, a - a0, b - b0)]
    })
}

fn receive_entry_plane(grid: &mut Grid, face: Face, patch: &FluxPatch) -> Result<(), Error> {
    let m = face.axis;
    let ghost = upstream_ghost(face, grid.size()[m.index()]);
    let (_, a0, b0) = m.decompose(grid.to_global((0, 0, 0)));
    let plane = grid.interior().transverse(m);

    if patch.area() != &grid.region().transverse(m) {
        return Err(Error::FaceMismatch { expected: plane.len(), received: patch.len() });
    }
    for (a, b) in plane.iter() {
        if let Some(value) = patch.get((a + a0, b + b0)) {
            grid.flux[m.compose(ghost, a, b)] = value
        }
    }
    Ok(())
}
