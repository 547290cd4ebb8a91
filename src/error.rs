use std::error;
use std::fmt;




#[derive(Debug)]

/**
 * Error to represent invalid radiation-module configuration, a violated
 * internal invariant of the sub-cycle, or a failure of the message layer.
 * All of these are unrecoverable for the process that encounters them.
 */
pub enum Error {
    UnsupportedDirection(i32),
    UnsupportedDimension([i64; 3]),
    NegativeTimeStep { level: usize, domain: usize, dt: f64 },
    NegativeChemicalTimeStep { index: (i64, i64, i64), dt: f64, nh_dot: f64 },
    InvalidConfig(String),
    SourceAlreadyRegistered,
    NoGrid { level: usize, domain: usize },
    FaceMismatch { expected: usize, received: usize },
    Encode(String),
    Decode(String),
    Communication(String),
    ThreadPool(String),
}




// ============================================================================
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            UnsupportedDirection(code) => {
                write!(fmt, "unsupported radiation direction code: {} (expected one of +-1, +-2, +-3)", code)
            }
            UnsupportedDimension(size) => {
                write!(fmt, "ionizing radiation requires a 3D grid, got {}x{}x{}", size[0], size[1], size[2])
            }
            NegativeTimeStep { level, domain, dt } => {
                write!(fmt, "advance_radiation: negative time step {} on level {} domain {}", dt, level, domain)
            }
            NegativeChemicalTimeStep { index, dt, nh_dot } => write!(
                fmt,
                "compute_chem_rates: dt_chem = {} < 0 at cell ({} {} {}), nh_dot = {}",
                dt, index.0, index.1, index.2, nh_dot
            ),
            InvalidConfig(message) => write!(fmt, "invalid radiation config: {}", message),
            SourceAlreadyRegistered => write!(fmt, "a radiation source is already registered on this mesh"),
            NoGrid { level, domain } => {
                write!(fmt, "no grid on this process for level {} domain {}", level, domain)
            }
            FaceMismatch { expected, received } => write!(
                fmt,
                "flux face has {} values but the overlap expects {}",
                received, expected
            ),
            Encode(message) => write!(fmt, "message encode failed: {}", message),
            Decode(message) => write!(fmt, "message decode failed: {}", message),
            Communication(message) => write!(fmt, "communication failed: {}", message),
            ThreadPool(message) => write!(fmt, "thread pool: {}", message),
        }
    }
}

impl error::Error for Error {}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Encode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
