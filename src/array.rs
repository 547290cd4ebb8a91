use std::ops::{Index, IndexMut};
use serde::{Deserialize, Serialize};
use crate::index_space::IndexSpace3;




/**
 * A 3D array of values backed by a row-major buffer, addressed by signed
 * indexes within its index space. Out-of-range access panics with the
 * offending index.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Array3<T> {
    space: IndexSpace3,
    data: Vec<T>,
}




// ============================================================================
impl<T: Clone> Array3<T> {

    pub fn filled(space: IndexSpace3, value: T) -> Self {
        let data = vec![value; space.len()];
        Self { space, data }
    }

    pub fn fill(&mut self, value: T) {
        for x in self.data.iter_mut() {
            *x = value.clone()
        }
    }
}

impl<T> Array3<T> {

    pub fn from_function<F>(space: IndexSpace3, f: F) -> Self
    where
        F: Fn((i64, i64, i64)) -> T,
    {
        let data = space.iter().map(f).collect();
        Self { space, data }
    }

    pub fn space(&self) -> &IndexSpace3 {
        &self.space
    }

    pub fn get(&self, index: (i64, i64, i64)) -> Option<&T> {
        if self.space.contains(index) {
            Some(&self.data[self.space.row_major_offset(index)])
        } else {
            None
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    fn validate_index(&self, index: (i64, i64, i64)) {
        if !self.space.contains(index) {
            panic!("index ({} {} {}) out of range on array {:?}",
                index.0,
                index.1,
                index.2,
                self.space);
        }
    }
}

impl<T> Index<(i64, i64, i64)> for Array3<T> {
    type Output = T;

    fn index(&self, index: (i64, i64, i64)) -> &T {
        self.validate_index(index);
        &self.data[self.space.row_major_offset(index)]
    }
}

impl<T> IndexMut<(i64, i64, i64)> for Array3<T> {
    fn index_mut(&mut self, index: (i64, i64, i64)) -> &mut T {
        self.validate_index(index);
        let n = self.space.row_major_offset(index);
        &mut self.data[n]
    }
}
