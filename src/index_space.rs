use core::ops::Range;
use serde::{Deserialize, Serialize};
use crate::geometry::Axis;




#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]


/**
 * Represents a rectangular region in a discrete 2D index space, used for the
 * plane of cells transverse to the radiation propagation axis.
 */
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
}




/**
 * Describes a rectangular index space. The index type is signed 64-bit integer.
 */
impl IndexSpace {


    pub fn new(di: Range<i64>, dj: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end,
            "index space has negative volume");

        Self { di, dj }
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m) = self.dim();
        l * m
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> (i64, i64) {
        (self.di.start, self.dj.start)
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> (i64, i64) {
        (self.di.end, self.dj.end)
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: (i64, i64)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1)
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (i64, i64)) -> usize {
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let m = (self.dj.end - self.dj.start) as usize;
        i * m + j
    }


    /**
     * Return the smallest index space, at a level `factor` times coarser,
     * which covers this one.
     */
    pub fn coarsen(&self, factor: i64) -> Self {
        let cover = |r: &Range<i64>| r.start.div_euclid(factor)..(r.end + factor - 1).div_euclid(factor);
        Self::new(cover(&self.di), cover(&self.dj))
    }


    /**
     * Return an iterator which traverses the index space in row-major order
     * (C-like; the final index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.di.clone().map(move |i| self.dj.clone().map(move |j| (i, j))).flatten()
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range2d(di: Range<i64>, dj: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj)
}




#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]


/**
 * A rectangular block of a 3D index space. Grids, domains, and overlap
 * regions are all described this way, either in grid-local coordinates
 * (where ghost cells have negative indexes) or in the global coordinates of
 * a refinement level.
 */
pub struct IndexSpace3 {
    di: Range<i64>,
    dj: Range<i64>,
    dk: Range<i64>,
}




// ============================================================================
impl IndexSpace3 {

    pub fn new(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> Self {
        assert!(
            di.start <= di.end && dj.start <= dj.end && dk.start <= dk.end,
            "index space has negative volume");

        Self { di, dj, dk }
    }

    /**
     * The block of the given size whose lower corner is at `start`.
     */
    pub fn from_start_size(start: [i64; 3], size: [i64; 3]) -> Self {
        Self::new(
            start[0]..start[0] + size[0],
            start[1]..start[1] + size[1],
            start[2]..start[2] + size[2])
    }

    pub fn range(&self, axis: Axis) -> &Range<i64> {
        match axis {
            Axis::X => &self.di,
            Axis::Y => &self.dj,
            Axis::Z => &self.dk,
        }
    }

    pub fn start(&self) -> [i64; 3] {
        [self.di.start, self.dj.start, self.dk.start]
    }

    pub fn end(&self) -> [i64; 3] {
        [self.di.end, self.dj.end, self.dk.end]
    }

    pub fn size(&self) -> [i64; 3] {
        [
            self.di.end - self.di.start,
            self.dj.end - self.dj.start,
            self.dk.end - self.dk.start,
        ]
    }

    pub fn len(&self) -> usize {
        let [l, m, n] = self.size();
        (l * m * n) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: (i64, i64, i64)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1) && self.dk.contains(&index.2)
    }

    /**
     * Expand this index space by the given number of elements on each axis.
     */
    pub fn extend_all(&self, delta: i64) -> Self {
        Self::new(
            self.di.start - delta .. self.di.end + delta,
            self.dj.start - delta .. self.dj.end + delta,
            self.dk.start - delta .. self.dk.end + delta)
    }

    /**
     * Shift this index space by the given offset on each axis.
     */
    pub fn translate(&self, offset: [i64; 3]) -> Self {
        Self::new(
            self.di.start + offset[0] .. self.di.end + offset[0],
            self.dj.start + offset[1] .. self.dj.end + offset[1],
            self.dk.start + offset[2] .. self.dk.end + offset[2])
    }

    /**
     * Map this index space to the next finer level, where each element
     * becomes `factor` elements on each axis.
     */
    pub fn refine(&self, factor: i64) -> Self {
        Self::new(
            self.di.start * factor .. self.di.end * factor,
            self.dj.start * factor .. self.dj.end * factor,
            self.dk.start * factor .. self.dk.end * factor)
    }

    /**
     * Return the intersection with another index space, or `None` if the two
     * do not overlap.
     */
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let clip = |a: &Range<i64>, b: &Range<i64>| a.start.max(b.start) .. a.end.min(b.end);
        let di = clip(&self.di, &other.di);
        let dj = clip(&self.dj, &other.dj);
        let dk = clip(&self.dk, &other.dk);

        if di.start < di.end && dj.start < dj.end && dk.start < dk.end {
            Some(Self { di, dj, dk })
        } else {
            None
        }
    }

    /**
     * Return the plane of this index space transverse to the given axis.
     */
    pub fn transverse(&self, axis: Axis) -> IndexSpace {
        let (a, b) = axis.transverse();
        IndexSpace::new(self.range(a).clone(), self.range(b).clone())
    }

    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (i64, i64, i64)) -> usize {
        let [_, m, n] = self.size();
        let i = index.0 - self.di.start;
        let j = index.1 - self.dj.start;
        let k = index.2 - self.dk.start;
        ((i * m + j) * n + k) as usize
    }

    /**
     * Return an iterator which traverses the index space in row-major order.
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64, i64)> + '_ {
        self.di.clone().flat_map(move |i| {
            self.dj.clone().flat_map(move |j| self.dk.clone().map(move |k| (i, j, k)))
        })
    }
}
