use serde::{Deserialize, Serialize};
use crate::bvals::BoundaryTable;
use crate::error::Error;
use crate::geometry::{Face, PlaneSource, Side};
use crate::grid::Grid;
use crate::index_space::{IndexSpace, IndexSpace3};
use crate::message::comm::Group;
use crate::patch::FluxPatch;




/// The decomposition of a domain into blocks, one per process. Blocks are
/// numbered in row-major order over the block grid, and `ranks[b]` is the
/// process owning block `b`.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    blocks: [usize; 3],
    ranks: Vec<usize>,
}

impl Layout {
    pub fn new(blocks: [usize; 3], ranks: Vec<usize>) -> Result<Self, Error> {
        let num_blocks = blocks.iter().product::<usize>();

        if num_blocks == 0 || ranks.len() != num_blocks {
            return Err(Error::InvalidConfig(format!(
                "layout {:?} needs {} ranks, got {}",
                blocks,
                num_blocks,
                ranks.len()
            )));
        }
        for (n, r) in ranks.iter().enumerate() {
            if ranks[..n].contains(r) {
                return Err(Error::InvalidConfig(format!("rank {} owns more than one block of a domain", r)));
            }
        }
        Ok(Self { blocks, ranks })
    }

    /// A layout with the whole domain on one process.
    ///
    pub fn single(rank: usize) -> Self {
        Self { blocks: [1, 1, 1], ranks: vec![rank] }
    }

    pub fn blocks(&self) -> [usize; 3] {
        self.blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.ranks.len()
    }

    pub fn rank_of(&self, block: usize) -> usize {
        self.ranks[block]
    }

    pub fn block_of_rank(&self, rank: usize) -> Option<usize> {
        self.ranks.iter().position(|&r| r == rank)
    }

    /// The group of processes sharing this domain, in block order.
    ///
    pub fn group(&self) -> Group {
        Group::new(self.ranks.clone())
    }

    pub fn block_coords(&self, block: usize) -> [usize; 3] {
        let [_, nj, nk] = self.blocks;
        [block / (nj * nk), (block / nk) % nj, block % nk]
    }

    pub fn block_index(&self, coords: [usize; 3]) -> usize {
        let [_, nj, nk] = self.blocks;
        (coords[0] * nj + coords[1]) * nk + coords[2]
    }

    /// The cells of the given block, in the same index space as `region`,
    /// which is the whole domain. Blocks split each axis as evenly as
    /// possible.
    ///
    pub fn block_region(&self, region: &IndexSpace3, block: usize) -> IndexSpace3 {
        let coords = self.block_coords(block);
        let start = region.start();
        let size = region.size();
        let mut lo = [0; 3];
        let mut hi = [0; 3];

        for a in 0..3 {
            let n = self.blocks[a] as i64;
            let b = coords[a] as i64;
            lo[a] = start[a] + size[a] * b / n;
            hi[a] = start[a] + size[a] * (b + 1) / n;
        }
        IndexSpace3::new(lo[0]..hi[0], lo[1]..hi[1], lo[2]..hi[2])
    }
}




/// Records where a grid overlaps a grid on an adjacent refinement level.
/// On a child grid this describes a parent; on a parent grid it describes a
/// child. `face` is present when the overlap contains the entry plane of
/// the child domain for the radiation, and holds the exchanged flux values at the
/// parent's resolution.
///
#[derive(Clone, Debug)]
pub struct GridOverlap {
    pub rank: usize,
    pub domain: usize,
    pub block: usize,
    /// The peer grid's interior, in its own level's global coordinates
    pub peer_region: IndexSpace3,
    /// The overlap, in the child level's global coordinates
    pub region: IndexSpace3,
    pub face: Option<FluxPatch>,
}

/// Return the area (in global coordinates of the parent level, transverse to
/// the propagation axis) of the flux face a parent hands to a child through
/// the given overlap, or `None` if the overlap does not reach the entry plane
/// of `child_region`.
///
pub fn face_area(child_region: &IndexSpace3, overlap: &IndexSpace3, face: Face) -> Option<IndexSpace> {
    let m = face.axis;
    let touches_entry = match face.side {
        Side::Lower => overlap.range(m).start == child_region.range(m).start,
        Side::Upper => overlap.range(m).end == child_region.range(m).end,
    };
    if !touches_entry {
        return None;
    }
    Some(overlap.transverse(m).coarsen(2))
}

/// Return the global index, along the propagation axis and at the parent
/// level, of the parent cell whose incident flux enters the child.
///
pub fn parent_entry_index(child_region: &IndexSpace3, face: Face) -> i64 {
    let range = child_region.range(face.axis);
    match face.side {
        Side::Lower => range.start.div_euclid(2),
        Side::Upper => (range.end - 1).div_euclid(2),
    }
}




/// Describes one domain to be placed on the mesh: its refinement level, its
/// extent in the global index space of that level, and its decomposition.
///
#[derive(Clone, Debug)]
pub struct DomainSpec {
    pub level: usize,
    pub region: IndexSpace3,
    pub layout: Layout,
}

/// A rectangular sub-region of one refinement level. This process holds the
/// domain's grid if it owns one of the domain's blocks.
///
pub struct Domain {
    level: usize,
    number: usize,
    region: IndexSpace3,
    layout: Layout,
    pub grid: Option<Grid>,
}

impl Domain {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn region(&self) -> &IndexSpace3 {
        &self.region
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Displacement of the domain's lower corner, in cells of its level.
    ///
    pub fn displacement(&self) -> [i64; 3] {
        self.region.start()
    }
}




/// The static mesh refinement hierarchy, as seen from one process. Each
/// level is twice as fine as the one before it; level zero is the root.
///
pub struct Mesh {
    rank: usize,
    size: usize,
    root_spacing: [f64; 3],
    levels: Vec<Vec<Domain>>,
    pub source: Option<PlaneSource>,
    pub time: f64,
    pub dt: f64,
}

impl Mesh {
    /// Build the mesh for process `rank` of `size`. Domains are numbered in
    /// the order they appear within their level. Grids are created for the
    /// blocks owned by this process, along with their overlap descriptors
    /// and flux boundary tables.
    ///
    pub fn new(
        root_spacing: [f64; 3],
        num_guard: i64,
        specs: Vec<DomainSpec>,
        rank: usize,
        size: usize,
    ) -> Result<Self, Error> {
        let num_levels = specs.iter().map(|s| s.level + 1).max().unwrap_or(0);
        let mut levels: Vec<Vec<Domain>> = (0..num_levels).map(|_| Vec::new()).collect();

        for spec in specs {
            if let Some(r) = spec.layout.ranks.iter().find(|&&r| r >= size) {
                return Err(Error::InvalidConfig(format!("rank {} is outside a group of {}", r, size)));
            }
            let level = &mut levels[spec.level];
            let number = level.len();
            level.push(Domain {
                level: spec.level,
                number,
                region: spec.region,
                layout: spec.layout,
                grid: None,
            });
        }
        if levels.first().map_or(true, |l| l.is_empty()) {
            return Err(Error::InvalidConfig("the mesh has no root level domain".into()));
        }

        let mut mesh = Self { rank, size, root_spacing, levels, source: None, time: 0.0, dt: 0.0 };
        mesh.create_grids(num_guard);
        Ok(mesh)
    }

    fn create_grids(&mut self, num_guard: i64) {
        let root = self.root_region();

        for level in 0..self.levels.len() {
            for number in 0..self.levels[level].len() {
                let domain = &self.levels[level][number];

                if let Some(block) = domain.layout.block_of_rank(self.rank) {
                    let region = domain.layout.block_region(&domain.region, block);
                    let spacing = self.spacing(level);
                    let mut grid = Grid::new(level, number, block, region.clone(), spacing, num_guard);

                    grid.boundaries = BoundaryTable::for_region(&region, &root.refine(1 << level));
                    if level > 0 {
                        grid.parents = self.overlaps(&region, level - 1, |r| r.refine(2));
                    }
                    if level + 1 < self.levels.len() {
                        grid.children = self.overlaps(&region.refine(2), level + 1, |r| r.clone());
                    }
                    self.levels[level][number].grid = Some(grid);
                }
            }
        }
    }

    /// Find the blocks on `level` overlapping `region`, where `region` and
    /// the overlaps are expressed at the finer of the two levels, and
    /// `to_fine` maps a block region on `level` to that finer level.
    ///
    fn overlaps<F>(&self, region: &IndexSpace3, level: usize, to_fine: F) -> Vec<GridOverlap>
    where
        F: Fn(&IndexSpace3) -> IndexSpace3,
    {
        let mut result = Vec::new();

        for domain in &self.levels[level] {
            for block in 0..domain.layout.num_blocks() {
                let peer_region = domain.layout.block_region(&domain.region, block);

                if let Some(overlap) = region.intersect(&to_fine(&peer_region)) {
                    result.push(GridOverlap {
                        rank: domain.layout.rank_of(block),
                        domain: domain.number,
                        block,
                        peer_region,
                        region: overlap,
                        face: None,
                    })
                }
            }
        }
        result
    }

    /// Allocate the flux face buffers of every overlap which reaches the
    /// entry plane of a child domain for radiation entering through `face`.
    /// Child blocks further downstream take their entry flux from the
    /// pipeline within their own domain instead.
    ///
    pub fn allocate_faces(&mut self, face: Face) {
        let regions: Vec<Vec<IndexSpace3>> = self
            .levels
            .iter()
            .map(|level| level.iter().map(|d| d.region.clone()).collect())
            .collect();

        for domains in self.levels.iter_mut() {
            for domain in domains.iter_mut() {
                let domain_region = &domain.region;

                if let Some(grid) = domain.grid.as_mut() {
                    let level = grid.level();

                    for overlap in grid.parents.iter_mut() {
                        overlap.face = face_area(domain_region, &overlap.region, face)
                            .map(|area| FluxPatch::zeros(level.saturating_sub(1), area));
                    }
                    for overlap in grid.children.iter_mut() {
                        overlap.face = face_area(&regions[level + 1][overlap.domain], &overlap.region, face)
                            .map(|area| FluxPatch::zeros(level, area));
                    }
                }
            }
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// The extent of the root level.
    ///
    pub fn root_region(&self) -> IndexSpace3 {
        self.levels[0][0].region.clone()
    }

    pub fn spacing(&self, level: usize) -> [f64; 3] {
        let r = (1u64 << level) as f64;
        [self.root_spacing[0] / r, self.root_spacing[1] / r, self.root_spacing[2] / r]
    }

    pub fn domains(&self, level: usize) -> &[Domain] {
        self.levels.get(level).map_or(&[], |domains| domains.as_slice())
    }

    pub fn domain(&self, level: usize, number: usize) -> Option<&Domain> {
        self.levels.get(level)?.get(number)
    }

    pub fn domain_mut(&mut self, level: usize, number: usize) -> Option<&mut Domain> {
        self.levels.get_mut(level)?.get_mut(number)
    }

    pub fn grid(&self, level: usize, number: usize) -> Option<&Grid> {
        self.levels.get(level)?.get(number)?.grid.as_ref()
    }

    pub fn grid_mut(&mut self, level: usize, number: usize) -> Option<&mut Grid> {
        self.levels.get_mut(level)?.get_mut(number)?.grid.as_mut()
    }

    /// Iterate over the grids held by this process, coarse to fine.
    ///
    pub fn grids(&self) -> impl Iterator<Item = &Grid> {
        self.levels.iter().flat_map(|l| l.iter().filter_map(|d| d.grid.as_ref()))
    }

    pub fn grids_mut(&mut self) -> impl Iterator<Item = &mut Grid> {
        self.levels.iter_mut().flat_map(|l| l.iter_mut().filter_map(|d| d.grid.as_mut()))
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::geometry::Axis;
    use crate::index_space::range2d;

    fn two_level_specs() -> Vec<DomainSpec> {
        vec![
            DomainSpec { level: 0, region: IndexSpace3::new(0..8, 0..8, 0..8), layout: Layout::single(0) },
            DomainSpec { level: 1, region: IndexSpace3::new(0..8, 4..12, 4..12), layout: Layout::single(0) },
        ]
    }

    #[test]
    fn layout_blocks_tile_the_domain() {
        let layout = Layout::new([2, 1, 3], vec![0, 1, 2, 3, 4, 5]).unwrap();
        let region = IndexSpace3::new(0..10, 0..4, 0..9);
        let total: usize = (0..6).map(|b| layout.block_region(&region, b).len()).sum();
        assert_eq!(total, region.len());
        assert_eq!(layout.block_coords(4), [1, 0, 1]);
        assert_eq!(layout.block_index([1, 0, 1]), 4);
        assert_eq!(layout.block_region(&region, 4), IndexSpace3::new(5..10, 0..4, 3..6));
        assert!(Layout::new([2, 1, 1], vec![0, 0]).is_err());
        assert!(Layout::new([2, 1, 1], vec![0]).is_err());
    }

    #[test]
    fn two_level_mesh_has_matching_overlaps() {
        let mut mesh = Mesh::new([1.0; 3], 2, two_level_specs(), 0, 1).unwrap();
        mesh.allocate_faces(Face::new(Axis::X, Side::Lower));

        let fine = mesh.grid(1, 0).unwrap();
        assert_eq!(fine.spacing(), [0.5; 3]);
        assert_eq!(fine.parents.len(), 1);
        assert_eq!(fine.parents[0].region, IndexSpace3::new(0..8, 4..12, 4..12));
        assert_eq!(fine.parents[0].face.as_ref().unwrap().area(), &range2d(2..6, 2..6));

        let coarse = mesh.grid(0, 0).unwrap();
        assert_eq!(coarse.children.len(), 1);
        assert_eq!(coarse.children[0].face.as_ref().unwrap().area(), &range2d(2..6, 2..6));
    }

    #[test]
    fn faces_only_where_overlap_reaches_the_entry_plane() {
        let child = IndexSpace3::new(4..12, 0..4, 0..4);
        let front = IndexSpace3::new(4..8, 0..4, 0..4);
        let back = IndexSpace3::new(8..12, 0..4, 0..4);
        let lower = Face::new(Axis::X, Side::Lower);
        let upper = Face::new(Axis::X, Side::Upper);
        assert!(face_area(&child, &front, lower).is_some());
        assert!(face_area(&child, &back, lower).is_none());
        assert!(face_area(&child, &back, upper).is_some());
        assert_eq!(parent_entry_index(&child, lower), 2);
        assert_eq!(parent_entry_index(&child, upper), 5);
    }
}
