#![deny(clippy::all)]

pub mod boundary;
pub mod config;
pub mod decomposition;
pub mod diagnostics;
pub mod error;
pub mod examples;
pub mod grid;
pub mod indexing;
pub mod inversion;
mod linalg;
pub mod model;
pub mod operator;
pub mod rhs;
pub mod state;
pub mod timestepper;
#[cfg(test)]
mod test_util;

use ndarray as nd;

pub type Float = f64;
pub use std::f64::consts as float_consts;

pub type Array1 = nd::Array1<Float>;
pub type Array2 = nd::Array2<Float>;

/// A scalar field over the global `(Nx, Ny, Nz)` index space, indexed `[i, j, k]`.
pub type Field3 = nd::Array3<Float>;

pub use config::ModelConfig;
pub use error::{QgError, Result};
pub use grid::Grid;
pub use model::QgModel;
pub use state::State;

/// Seconds per day, used when reporting model time.
pub const SECONDS_PER_DAY: Float = 86400.;
