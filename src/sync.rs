use std::collections::HashMap;
use log::debug;
use crate::error::Error;
use crate::geometry::Face;
use crate::grid::Grid;
use crate::mesh::parent_entry_index;
use crate::message::comm::{Communicator, Tag};
use crate::patch::FluxPatch;
use crate::ray::upstream_ghost;




/**
 * Flux faces handed between a parent and a child grid living on the same
 * process. Keys are the transfer tag plus the parent and child block
 * numbers, so several overlaps between the same pair of domains stay apart.
 */
#[derive(Default)]
pub struct Mailbox {
    patches: HashMap<(Tag, usize, usize), FluxPatch>,
}




// ============================================================================
impl Mailbox {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    fn post(&mut self, tag: Tag, parent_block: usize, child_block: usize, patch: FluxPatch) {
        self.patches.insert((tag, parent_block, child_block), patch);
    }

    fn take(&mut self, tag: Tag, parent_block: usize, child_block: usize) -> Option<FluxPatch> {
        self.patches.remove(&(tag, parent_block, child_block))
    }
}




/**
 * The tag of a flux face sent to a child domain on `child_level`.
 */
pub fn flux_tag(child_level: usize, parent: usize, child: usize) -> Tag {
    Tag::Flux { level: child_level, parent, child }
}




/**
 * Gather the incident flux of this grid's cells on each child's entry plane
 * into the overlap's face buffer, and hand the buffer to the child: through
 * the mailbox if the child grid lives on this process, and as a message
 * otherwise. Values stay at this grid's resolution; the child refines them
 * on receipt.
 */
pub fn send_to_children<C: Communicator>(
    grid: &mut Grid,
    face: Face,
    mailbox: &mut Mailbox,
    comm: &C,
) -> Result<(), Error> {
    let m = face.axis;
    let level = grid.level();
    let domain = grid.domain();
    let parent_block = grid.block();

    for n in 0..grid.children.len() {
        let overlap = &grid.children[n];
        let buffer = match &overlap.face {
            Some(buffer) => buffer,
            None => continue,
        };
        let entry = parent_entry_index(&overlap.region, face);
        let patch = FluxPatch::from_function(buffer.level(), buffer.area().clone(), |(a, b)| {
            grid.flux[grid.to_local(m.compose(entry, a, b))]
        });
        let (rank, block) = (overlap.rank, overlap.block);
        let tag = flux_tag(level + 1, domain, overlap.domain);

        if rank == comm.rank() {
            mailbox.post(tag, parent_block, block, patch.clone())
        } else {
            debug!("[{}] sending flux face of {} values to {} ({:?})", comm.rank(), patch.len(), rank, tag);
            comm.send(rank, tag, patch.to_bytes()?)?
        }
        grid.children[n].face = Some(patch);
    }
    Ok(())
}

/**
 * Collect the flux face from every parent overlapping this grid's entry
 * plane, blocking until all of them have arrived, and scatter the values
 * into the upstream ghost plane. Each parent value covers the two-by-two
 * block of child cells inside it.
 */
pub fn receive_from_parents<C: Communicator>(
    grid: &mut Grid,
    face: Face,
    mailbox: &mut Mailbox,
    comm: &C,
) -> Result<(), Error> {
    let m = face.axis;
    let level = grid.level();
    let domain = grid.domain();
    let block = grid.block();
    let ghost = upstream_ghost(face, grid.size()[m.index()]);
    let plane = grid.flux.space().transverse(m);
    let mut received = Vec::new();

    for overlap in grid.parents.iter_mut() {
        let expected = match &overlap.face {
            Some(buffer) => buffer.area().clone(),
            None => continue,
        };
        let tag = flux_tag(level, overlap.domain, domain);

        let patch = if overlap.rank == comm.rank() {
            mailbox.take(tag, overlap.block, block).ok_or_else(|| {
                Error::Communication(format!("no flux face posted for {:?} from block {}", tag, overlap.block))
            })?
        } else {
            FluxPatch::from_bytes(&comm.recv(overlap.rank, tag)?)?
        };

        if patch.area() != &expected {
            return Err(Error::FaceMismatch { expected: expected.len(), received: patch.len() });
        }
        debug!("[{}] level {} domain {}: received flux face from block {}", comm.rank(), level, domain, overlap.block);
        received.push(patch.clone());
        overlap.face = Some(patch);
    }

    for (a, b) in plane.iter() {
        let local = m.compose(ghost, a, b);
        let (_, ga, gb) = m.decompose(grid.to_global(local));

        for patch in &received {
            if let Some(value) = patch.sample(level, (ga, gb)) {
                grid.flux[local] = value
            }
        }
    }
    Ok(())
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::geometry::{Axis, Side};
    use crate::index_space::IndexSpace3;
    use crate::mesh::{DomainSpec, Layout, Mesh};
    use crate::message::local::{run_group, LocalCommunicator};

    fn specs(fine: IndexSpace3, coarse_rank: usize, fine_rank: usize) -> Vec<DomainSpec> {
        vec![
            DomainSpec { level: 0, region: IndexSpace3::new(0..8, 0..8, 0..8), layout: Layout::single(coarse_rank) },
            DomainSpec { level: 1, region: fine, layout: Layout::single(fine_rank) },
        ]
    }

    fn coarse_flux((i, j, k): (i64, i64, i64)) -> f64 {
        (1000 + i * 100 + j * 10 + k) as f64
    }

    fn fill_coarse(mesh: &mut Mesh) {
        let grid = mesh.grid_mut(0, 0).unwrap();
        let space = grid.interior();
        for index in space.iter() {
            grid.flux[index] = coarse_flux(index)
        }
    }

    #[test]
    fn fine_ghost_plane_takes_covering_coarse_flux() {
        let face = Face::new(Axis::X, Side::Lower);
        let comm = LocalCommunicator::group(1).remove(0);
        let mut mesh = Mesh::new([1.0; 3], 2, specs(IndexSpace3::new(0..8, 4..12, 4..12), 0, 0), 0, 1).unwrap();
        let mut mailbox = Mailbox::new();
        mesh.allocate_faces(face);
        fill_coarse(&mut mesh);

        send_to_children(mesh.grid_mut(0, 0).unwrap(), face, &mut mailbox, &comm).unwrap();
        assert_eq!(mailbox.len(), 1);
        receive_from_parents(mesh.grid_mut(1, 0).unwrap(), face, &mut mailbox, &comm).unwrap();
        assert!(mailbox.is_empty());

        let fine = mesh.grid(1, 0).unwrap();
        for j in 0..8 {
            for k in 0..8 {
                let expected = coarse_flux((0, (j + 4) / 2, (k + 4) / 2));
                assert_eq!(fine.flux[(-1, j, k)], expected);
            }
        }
        // Each coarse value covers a two-by-two block of fine cells
        assert_eq!(fine.flux[(-1, 2, 4)], fine.flux[(-1, 3, 5)]);
        assert_ne!(fine.flux[(-1, 1, 4)], fine.flux[(-1, 2, 4)]);
        // Ghost lines outside the coarse face are left for the boundary rules
        assert_eq!(fine.flux[(-1, -1, 0)], 0.0);
    }

    #[test]
    fn upper_face_hand_off_uses_last_coarse_cell() {
        let face = Face::new(Axis::Y, Side::Upper);
        let comm = LocalCommunicator::group(1).remove(0);
        let mut mesh = Mesh::new([1.0; 3], 2, specs(IndexSpace3::new(2..10, 6..14, 0..4), 0, 0), 0, 1).unwrap();
        let mut mailbox = Mailbox::new();
        mesh.allocate_faces(face);
        fill_coarse(&mut mesh);

        send_to_children(mesh.grid_mut(0, 0).unwrap(), face, &mut mailbox, &comm).unwrap();
        receive_from_parents(mesh.grid_mut(1, 0).unwrap(), face, &mut mailbox, &comm).unwrap();

        let fine = mesh.grid(1, 0).unwrap();
        for i in 0..8 {
            for k in 0..4 {
                assert_eq!(fine.flux[(i, 8, k)], coarse_flux(((i + 2) / 2, 6, k / 2)));
            }
        }
    }

    #[test]
    fn hand_off_between_processes_matches_local() {
        let face = Face::new(Axis::X, Side::Lower);
        let fine = IndexSpace3::new(0..8, 4..12, 4..12);

        let planes = run_group(2, |comm| {
            let mut mesh = Mesh::new([1.0; 3], 2, specs(fine.clone(), 0, 1), comm.rank(), 2).unwrap();
            let mut mailbox = Mailbox::new();
            mesh.allocate_faces(face);

            if comm.rank() == 0 {
                fill_coarse(&mut mesh);
                send_to_children(mesh.grid_mut(0, 0).unwrap(), face, &mut mailbox, &comm).unwrap();
                assert!(mesh.grid(1, 0).is_none());
                Vec::new()
            } else {
                let grid = mesh.grid_mut(1, 0).unwrap();
                receive_from_parents(grid, face, &mut mailbox, &comm).unwrap();
                grid.interior().transverse(Axis::X).iter().map(|(j, k)| grid.flux[(-1, j, k)]).collect()
            }
        })
        .unwrap();

        let expected: Vec<f64> = IndexSpace3::new(0..1, 0..8, 0..8)
            .transverse(Axis::X)
            .iter()
            .map(|(j, k)| coarse_flux((0, (j + 4) / 2, (k + 4) / 2)))
            .collect();
        assert_eq!(planes[1], expected);
    }
}
