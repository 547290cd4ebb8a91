use crate::array::Array3;
use crate::geometry::{Axis, Face, Side};
use crate::grid::Grid;
use crate::index_space::IndexSpace3;




/**
 * What fills the ghost layer of the flux field on one face of a grid
 */
#[derive(Clone, Copy, Debug)]
pub enum FluxBoundary {
    /// Copy the adjacent interior layer outward (zero gradient). Used where
    /// the face lies on the physical boundary of the mesh.
    Outflow,
    /// Leave the ghost layer alone; it is written by the coarse-to-fine flux
    /// exchange or the ray integrator.
    Prolongate,
    /// A problem-specific rule, chosen at grid setup
    UserDefined(fn(&mut Array3<f64>, Face)),
}




/**
 * The boundary rule for each of the six faces of a grid, indexed by axis and
 * side.
 */
#[derive(Clone, Copy, Debug)]
pub struct BoundaryTable {
    faces: [[FluxBoundary; 2]; 3],
}




// ============================================================================
impl Default for BoundaryTable {
    fn default() -> Self {
        Self { faces: [[FluxBoundary::Prolongate; 2]; 3] }
    }
}




// ============================================================================
impl BoundaryTable {

    /**
     * Select the rules for a grid covering `region` on a level whose full
     * extent is `level_extent`: faces on the edge of the level get outflow,
     * all others are left to the flux exchange.
     */
    pub fn for_region(region: &IndexSpace3, level_extent: &IndexSpace3) -> Self {
        let mut table = Self::default();

        for axis in Axis::ALL.iter() {
            let r = region.range(*axis);
            let e = level_extent.range(*axis);

            if r.start <= e.start {
                table.set(Face::new(*axis, Side::Lower), FluxBoundary::Outflow)
            }
            if r.end >= e.end {
                table.set(Face::new(*axis, Side::Upper), FluxBoundary::Outflow)
            }
        }
        table
    }

    pub fn get(&self, face: Face) -> FluxBoundary {
        self.faces[face.axis.index()][side_index(face.side)]
    }

    pub fn set(&mut self, face: Face, boundary: FluxBoundary) {
        self.faces[face.axis.index()][side_index(face.side)] = boundary
    }

    /**
     * Fill the ghost layers of a flux field, visiting the axes in x, y, z
     * order so that edges and corners take values already extended along
     * the earlier axes.
     */
    pub fn apply(&self, flux: &mut Array3<f64>) {
        for axis in Axis::ALL.iter() {
            for side in [Side::Lower, Side::Upper].iter() {
                let face = Face::new(*axis, *side);

                match self.get(face) {
                    FluxBoundary::Outflow => outflow(flux, face),
                    FluxBoundary::Prolongate => {}
                    FluxBoundary::UserDefined(f) => f(flux, face),
                }
            }
        }
    }
}




/**
 * Apply the flux boundary rules of a grid to its flux field.
 */
pub fn apply_flux_boundaries(grid: &mut Grid) {
    let table = grid.boundaries;
    table.apply(&mut grid.flux)
}




fn side_index(side: Side) -> usize {
    match side {
        Side::Lower => 0,
        Side::Upper => 1,
    }
}

fn outflow(flux: &mut Array3<f64>, face: Face) {
    let space = flux.space().clone();
    let range = space.range(face.axis);
    let (ghost, inner) = match face.side {
        Side::Lower => (range.start, range.start + 1),
        Side::Upper => (range.end - 1, range.end - 2),
    };
    for (a, b) in space.transverse(face.axis).iter() {
        flux[face.axis.compose(ghost, a, b)] = flux[face.axis.compose(inner, a, b)]
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    fn field() -> Array3<f64> {
        let interior = IndexSpace3::new(0..3, 0..3, 0..3);
        let mut flux = Array3::filled(interior.extend_all(1), -1.0);
        for index in interior.iter() {
            flux[index] = (index.0 * 100 + index.1 * 10 + index.2) as f64;
        }
        flux
    }

    #[test]
    fn outflow_copies_interior_layer_into_edges_and_corners() {
        let mut flux = field();
        let table = BoundaryTable { faces: [[FluxBoundary::Outflow; 2]; 3] };
        table.apply(&mut flux);
        assert_eq!(flux[(-1, 1, 2)], 12.0);
        assert_eq!(flux[(3, 1, 2)], 212.0);
        assert_eq!(flux[(1, -1, 3)], 102.0);
        assert_eq!(flux[(-1, -1, -1)], 0.0);
        assert_eq!(flux[(3, 3, 3)], 222.0);
        assert!(flux.values().all(|&f| f >= 0.0));
    }

    #[test]
    fn prolongate_faces_are_untouched() {
        let mut flux = field();
        let mut table = BoundaryTable::default();
        table.set(Face::new(Axis::Y, Side::Upper), FluxBoundary::Outflow);
        table.apply(&mut flux);
        assert_eq!(flux[(-1, 1, 1)], -1.0);
        assert_eq!(flux[(1, 3, 1)], 121.0);
        assert_eq!(flux[(1, -1, 1)], -1.0);
    }

    #[test]
    fn user_defined_boundary_is_dispatched() {
        fn zero_face(flux: &mut Array3<f64>, face: Face) {
            let space = flux.space().clone();
            for (a, b) in space.transverse(face.axis).iter() {
                flux[face.axis.compose(space.range(face.axis).start, a, b)] = 0.0
            }
        }
        let mut flux = field();
        let mut table = BoundaryTable::default();
        table.set(Face::new(Axis::Z, Side::Lower), FluxBoundary::UserDefined(zero_face));
        table.apply(&mut flux);
        assert_eq!(flux[(1, 1, -1)], 0.0);
    }

    #[test]
    fn only_faces_on_the_level_edge_get_outflow() {
        let extent = IndexSpace3::new(0..16, 0..16, 0..16);
        let table = BoundaryTable::for_region(&IndexSpace3::new(0..8, 4..12, 8..16), &extent);
        assert!(matches!(table.get(Face::new(Axis::X, Side::Lower)), FluxBoundary::Outflow));
        assert!(matches!(table.get(Face::new(Axis::X, Side::Upper)), FluxBoundary::Prolongate));
        assert!(matches!(table.get(Face::new(Axis::Y, Side::Lower)), FluxBoundary::Prolongate));
        assert!(matches!(table.get(Face::new(Axis::Z, Side::Upper)), FluxBoundary::Outflow));
    }
}
