//! Rectilinear grids for the electrostatic solver
//!
//! This crate describes the regular 3D grids the Poisson solver works on: the lattice `Cell`
//! spanned by the grid, the validated `Shape`, per-axis `BoundaryConditions`, stencil
//! connectivity and the value-carrying `Grid`. It knows nothing about the linear system built
//! on top of it.

mod boundary;
mod cell;
mod connectivity;
mod mesh;
mod primitives;
mod resample;

pub use boundary::*;
pub use cell::*;
pub use connectivity::*;
pub use mesh::*;
pub use primitives::*;
pub use resample::*;

use miette::Diagnostic;
use nalgebra::RealField;
use num_traits::ToPrimitive;

/// A composite trait for the scalar field stored on a grid
///
/// We only want to allow the floating point types we can actually solve in, `f32` and `f64`,
/// so this trait is ONLY satisfied by real fields which can be sent across the solver threads
/// and truncated back to grid indices.
pub trait GridScalar: Copy + RealField + ToPrimitive + Send + Sync {}

impl<T> GridScalar for T where T: Copy + RealField + ToPrimitive + Send + Sync {}

#[derive(thiserror::Error, Debug, Diagnostic, PartialEq)]
/// Errors raised while describing a grid
pub enum MesherError {
    #[error("grid dimensions must all be positive, got {0:?}")]
    #[diagnostic(code(transporter_mesher::shape))]
    NonPositiveShape([usize; 3]),
    #[error("boundary conditions need exactly 3 axis pairs, got {0}")]
    #[diagnostic(code(transporter_mesher::boundary))]
    BoundaryArity(usize),
    #[error("axis {0} is periodic on one side only, periodic boundaries must be paired")]
    #[diagnostic(code(transporter_mesher::boundary))]
    UnpairedPeriodic(usize),
    #[error("the lattice vectors are linearly dependent")]
    #[diagnostic(code(transporter_mesher::cell))]
    SingularCell,
    #[error("grid of {expected} points cannot hold {found} values")]
    #[diagnostic(code(transporter_mesher::values))]
    ValueLength { expected: usize, found: usize },
}
