use serde::{Deserialize, Serialize};
use crate::array::Array3;
use crate::bvals::BoundaryTable;
use crate::geometry::Axis;
use crate::index_space::IndexSpace3;
use crate::mesh::GridOverlap;




/**
 * Conserved hydrodynamic state of one cell: mass density, momentum density,
 * total energy density, cell-centered magnetic field, and the partial
 * density of neutral hydrogen.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conserved {
    pub density: f64,
    pub momentum: [f64; 3],
    pub energy: f64,
    pub magnetic: [f64; 3],
    pub neutral_density: f64,
}




// ============================================================================
impl Conserved {

    pub fn momentum_squared(&self) -> f64 {
        self.momentum.iter().map(|m| m * m).sum()
    }

    pub fn velocity(&self, axis: Axis) -> f64 {
        self.momentum[axis.index()] / self.density
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.momentum_squared() / self.density
    }

    pub fn magnetic_energy(&self) -> f64 {
        0.5 * self.magnetic.iter().map(|b| b * b).sum::<f64>()
    }

    /**
     * Internal energy density: what is left of the total energy after the
     * kinetic and magnetic parts are removed.
     */
    pub fn thermal_energy(&self) -> f64 {
        self.energy - self.kinetic_energy() - self.magnetic_energy()
    }
}




/**
 * The block of cells owned by this process within one domain. Cell data is
 * addressed in grid-local coordinates, where the interior runs from zero to
 * `size` on each axis and guard cells have negative or `>= size` indexes.
 * The grid also carries the radiation flux field: the photon flux incident
 * on each cell from upstream, plus one ghost layer on every face. On the
 * propagation axis the upstream ghost layer holds the flux entering the grid
 * and the downstream ghost layer the flux leaving it.
 */
pub struct Grid {
    level: usize,
    domain: usize,
    block: usize,
    region: IndexSpace3,
    spacing: [f64; 3],
    num_guard: i64,
    cells: Array3<Conserved>,
    pub flux: Array3<f64>,
    pub dt: f64,
    pub time: f64,
    pub parents: Vec<GridOverlap>,
    pub children: Vec<GridOverlap>,
    pub boundaries: BoundaryTable,
}




// ============================================================================
impl Grid {

    /**
     * Create a grid covering `region`, given in the global index space of
     * refinement level `level`, with all cells zeroed.
     */
    pub fn new(
        level: usize,
        domain: usize,
        block: usize,
        region: IndexSpace3,
        spacing: [f64; 3],
        num_guard: i64,
    ) -> Self {
        let interior = IndexSpace3::from_start_size([0, 0, 0], region.size());
        Self {
            level,
            domain,
            block,
            spacing,
            num_guard,
            cells: Array3::filled(interior.extend_all(num_guard), Conserved::default()),
            flux: Array3::filled(interior.extend_all(1), 0.0),
            region,
            dt: 0.0,
            time: 0.0,
            parents: Vec::new(),
            children: Vec::new(),
            boundaries: BoundaryTable::default(),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn domain(&self) -> usize {
        self.domain
    }

    /**
     * Linear index of this grid's block in the domain layout.
     */
    pub fn block(&self) -> usize {
        self.block
    }

    /**
     * The interior cells of this grid in the global index space of its level.
     */
    pub fn region(&self) -> &IndexSpace3 {
        &self.region
    }

    pub fn size(&self) -> [i64; 3] {
        self.region.size()
    }

    pub fn num_guard(&self) -> i64 {
        self.num_guard
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn cell_length(&self, axis: Axis) -> f64 {
        self.spacing[axis.index()]
    }

    pub fn min_spacing(&self) -> f64 {
        self.spacing.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /**
     * Area of the smallest cell face.
     */
    pub fn min_face_area(&self) -> f64 {
        let [dx, dy, dz] = self.spacing;
        (dx * dy).min(dy * dz).min(dz * dx)
    }

    /**
     * The interior cells in grid-local coordinates.
     */
    pub fn interior(&self) -> IndexSpace3 {
        IndexSpace3::from_start_size([0, 0, 0], self.region.size())
    }

    /**
     * Convert a grid-local index to the global index space of this level.
     */
    pub fn to_global(&self, index: (i64, i64, i64)) -> (i64, i64, i64) {
        let [i0, j0, k0] = self.region.start();
        (index.0 + i0, index.1 + j0, index.2 + k0)
    }

    /**
     * Convert a global index of this level to grid-local coordinates.
     */
    pub fn to_local(&self, index: (i64, i64, i64)) -> (i64, i64, i64) {
        let [i0, j0, k0] = self.region.start();
        (index.0 - i0, index.1 - j0, index.2 - k0)
    }

    pub fn cell(&self, index: (i64, i64, i64)) -> &Conserved {
        &self.cells[index]
    }

    pub fn cell_mut(&mut self, index: (i64, i64, i64)) -> &mut Conserved {
        &mut self.cells[index]
    }

    pub fn cells(&self) -> &Array3<Conserved> {
        &self.cells
    }

    /**
     * Assign the state of every interior cell from a closure of the cell's
     * grid-local index.
     */
    pub fn set_interior<F>(&mut self, f: F)
    where
        F: Fn((i64, i64, i64)) -> Conserved,
    {
        let interior = self.interior();
        for index in interior.iter() {
            self.cells[index] = f(index)
        }
    }
}
