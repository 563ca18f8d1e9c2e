// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Transporter Poisson computes the electrostatic potential in a device held between fixed
//! potential electrodes
//!
//! # Overview
//! The potential is found on a regular grid spanning the lattice cell of the device. Every grid
//! point within a fixed radius of an atom belonging to an electrode is held at the potential of
//! that electrode, and everywhere else the potential satisfies the Laplace equation
//!
//! $ - \nabla^2 \phi = 0 $
//!
//! discretised with the seven point stencil along the three lattice directions. The outer faces
//! of the grid may be periodic, Dirichlet or Neumann. Once solved the field can be re-solved
//! inside a box whose faces are all fixed to the first solution, which removes the influence of
//! the chosen outer boundary on the interior.
//!
//! The resulting field is intended as the initial guess of a self-consistent transport
//! calculation.
//!
//! # Usage
//! The solver is run from the command line on a device description:
//!
//! ```toml
//! cell = [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 30.0]]
//!
//! [[sites]]
//! position = [5.0, 5.0, 1.0]
//! tag = "Au"
//! group = "Left"
//!
//! [[sites]]
//! position = [5.0, 5.0, 29.0]
//! tag = "Au"
//! group = "Right"
//!
//! [[potentials]]
//! group = "Left"
//! value = 0.0
//!
//! [[potentials]]
//! group = "Right"
//! value = 1.0
//! ```
//!
//! where every group other than `Device`, `Buffer` and those whose name contains `+` is an
//! electrode which needs a potential. The grid and the solver are configured in
//! `.config/default.toml`.

#![allow(clippy::type_complexity)]

/// The command line application, configuration and tracing
pub mod app;

/// Electrode constraints inside the linear system
pub mod constraint;

/// The boundary correction pass
pub mod correction;

/// Device geometry and electrodes
pub mod device;

/// Error handling
mod error;

/// Discretisation of the Laplace operator
pub mod operator;

/// The full solve pipeline
pub mod problem;

/// Spatial indexing of electrode regions
pub mod region;

/// Iterative linear solvers
pub mod solve;

pub use error::*;
