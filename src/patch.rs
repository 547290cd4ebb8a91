use serde::{Deserialize, Serialize};
use crate::error::Error;
use crate::index_space::IndexSpace;




/**
 * A flux patch is a mapping from a rectangular area of a plane transverse to
 * the propagation axis, at a given refinement level, to photon flux values.
 * It is the unit of exchange between grids: the plane handed from one
 * pipeline stage to the next, and the face handed from a parent grid to a
 * child. Indexes are global indexes of the patch's level.
 *
 * The patch can be sampled at a finer level than its own, in which case
 * piecewise constant prolongation is used: a fine index maps to the coarse
 * index containing it (`floor(index / 2)` per level).
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluxPatch {
    level: usize,
    area: IndexSpace,
    data: Vec<f64>,
}




// ============================================================================
impl FluxPatch {

    /**
     * Generate a patch at a given level, covering the given area, with all
     * values zero.
     */
    pub fn zeros(level: usize, area: IndexSpace) -> Self {
        let data = vec![0.0; area.len()];
        Self { level, area, data }
    }

    /**
     * Generate a patch at a given level, covering the given area, with values
     * defined from a closure.
     */
    pub fn from_function<F>(level: usize, area: IndexSpace, f: F) -> Self
    where
        F: Fn((i64, i64)) -> f64,
    {
        let data = area.iter().map(f).collect();
        Self { level, area, data }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn area(&self) -> &IndexSpace {
        &self.area
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /**
     * Return the value at the given index of the patch's own level, or
     * `None` if the index is outside the patch.
     */
    pub fn get(&self, index: (i64, i64)) -> Option<f64> {
        if self.area.contains(index) {
            Some(self.data[self.area.row_major_offset(index)])
        } else {
            None
        }
    }

    /**
     * Overwrite the value at the given index of the patch's own level.
     * Returns `false` (and leaves the patch alone) if the index is outside
     * the patch.
     */
    pub fn set(&mut self, index: (i64, i64), value: f64) -> bool {
        if self.area.contains(index) {
            let n = self.area.row_major_offset(index);
            self.data[n] = value;
            true
        } else {
            false
        }
    }

    /**
     * Sample the field at the given level and index. The index measures
     * cells at the sampling level, which must not be coarser than the patch.
     * Returns `None` if the index falls outside the patch.
     */
    pub fn sample(&self, level: usize, index: (i64, i64)) -> Option<f64> {
        if level == self.level {
            self.get(index)
        } else if level > self.level {
            self.sample(level - 1, (index.0.div_euclid(2), index.1.div_euclid(2)))
        } else {
            None
        }
    }

    /**
     * Encode the patch as a message buffer.
     */
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(rmp_serde::encode::to_vec(self)?)
    }

    /**
     * Decode a patch from a message buffer, checking that the values fill the
     * area.
     */
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let patch: Self = rmp_serde::decode::from_slice(bytes)?;

        if patch.data.len() != patch.area.len() {
            return Err(Error::FaceMismatch { expected: patch.area.len(), received: patch.data.len() });
        }
        Ok(patch)
    }
}
