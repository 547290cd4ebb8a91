//! Ionfront is the ionizing radiation module of a static mesh refinement
//! (SMR) magnetohydrodynamics code. A single plane source of monochromatic
//! ionizing photons illuminates the mesh from one face; photons are absorbed
//! along lines of cells by neutral hydrogen, and the resulting
//! photoionization, recombination, heating, and cooling are integrated in
//! sub-cycles much shorter than the hydrodynamic timestep. Refined levels
//! take their entry flux from the level above, and run to the time budget
//! set by the root level. Domains may be split over several processes,
//! which exchange messages through the `Communicator` trait.

pub mod array;
pub mod bvals;
pub mod cfl;
pub mod chemistry;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod index_space;
pub mod mesh;
pub mod message;
pub mod patch;
pub mod radiation;
pub mod rates;
pub mod ray;
pub mod subcycle;
pub mod sync;

pub use config::RadiationConfig;
pub use error::Error;
pub use radiation::IonRadiation;
