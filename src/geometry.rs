use serde::{Deserialize, Serialize};
use crate::error::Error;




/**
 * Enum to hold one of the three Cartesian axes of a grid
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}




// ============================================================================
impl Axis {

    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /**
     * The two axes orthogonal to this one, in increasing order.
     */
    pub fn transverse(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    /**
     * Assemble a 3D index from a position along this axis and a position on
     * the transverse plane (ordered as in `transverse`).
     */
    pub fn compose(self, along: i64, a: i64, b: i64) -> (i64, i64, i64) {
        match self {
            Axis::X => (along, a, b),
            Axis::Y => (a, along, b),
            Axis::Z => (a, b, along),
        }
    }

    /**
     * Split a 3D index into the position along this axis and the transverse
     * position. This is the inverse of `compose`.
     */
    pub fn decompose(self, index: (i64, i64, i64)) -> (i64, i64, i64) {
        match self {
            Axis::X => (index.0, index.1, index.2),
            Axis::Y => (index.1, index.0, index.2),
            Axis::Z => (index.2, index.0, index.1),
        }
    }
}




/**
 * Which end of an axis a face sits on
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Lower,
    Upper,
}




/**
 * One of the six axis-aligned faces of a grid or domain
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    pub axis: Axis,
    pub side: Side,
}




// ============================================================================
impl Face {

    pub fn new(axis: Axis, side: Side) -> Self {
        Self { axis, side }
    }

    /**
     * Decode a direction code: `-1, -2, -3` place the source plane on the
     * lower x, y, z face (radiation travels toward increasing index), and
     * `+1, +2, +3` on the upper face.
     */
    pub fn from_code(code: i32) -> Result<Self, Error> {
        let axis = match code.abs() {
            1 => Axis::X,
            2 => Axis::Y,
            3 => Axis::Z,
            _ => return Err(Error::UnsupportedDirection(code)),
        };
        let side = if code < 0 { Side::Lower } else { Side::Upper };
        Ok(Self { axis, side })
    }

    pub fn code(self) -> i32 {
        let n = self.axis.index() as i32 + 1;
        match self.side {
            Side::Lower => -n,
            Side::Upper => n,
        }
    }

    /**
     * Step along the face normal taken by radiation entering through this
     * face: +1 for a lower face, -1 for an upper face.
     */
    pub fn inward(self) -> i64 {
        match self.side {
            Side::Lower => 1,
            Side::Upper => -1,
        }
    }
}




/**
 * The single directional plane source of ionizing photons. The source plane
 * lies on `face` of the root domain and the photon number flux entering
 * through it is `flux`.
 */
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlaneSource {
    pub face: Face,
    pub flux: f64,
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn direction_codes_round_trip() {
        for code in [-3, -2, -1, 1, 2, 3].iter() {
            assert_eq!(Face::from_code(*code).unwrap().code(), *code);
        }
        assert_eq!(Face::from_code(-1).unwrap(), Face::new(Axis::X, Side::Lower));
        assert_eq!(Face::from_code(2).unwrap().inward(), -1);
    }

    #[test]
    fn unsupported_direction_is_rejected() {
        assert!(Face::from_code(0).is_err());
        assert!(Face::from_code(4).is_err());
        assert!(Face::from_code(-7).is_err());
    }

    #[test]
    fn compose_inverts_decompose() {
        for axis in Axis::ALL.iter() {
            let index = (3, 5, 7);
            let (m, a, b) = axis.decompose(index);
            assert_eq!(axis.compose(m, a, b), index);
        }
        assert_eq!(Axis::Y.compose(1, 2, 3), (2, 1, 3));
    }
}
