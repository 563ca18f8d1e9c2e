// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use miette::Diagnostic;
use transporter_mesher::MesherError;

/// Identifies which of the two solve passes produced a result
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolvePass {
    /// The electrode constrained solve under the caller's boundary conditions
    Initial,
    /// The re-solve with every box face fixed to the initial solution
    BoundaryCorrection,
}

impl std::fmt::Display for SolvePass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolvePass::Initial => write!(f, "initial"),
            SolvePass::BoundaryCorrection => write!(f, "boundary correction"),
        }
    }
}

#[derive(thiserror::Error, Debug, Diagnostic, PartialEq)]
/// Problems with the inputs to a solve, all of which are detected before any matrix is built
pub enum ConfigurationError {
    #[error("no potential was supplied for electrode(s) {0:?}")]
    #[diagnostic(
        code(transporter_poisson::potentials),
        help("every group other than `Device`, `Buffer` and names containing `+` is an electrode")
    )]
    MissingPotentials(Vec<String>),
    #[error("potential(s) supplied for unknown electrode(s) {0:?}")]
    #[diagnostic(code(transporter_poisson::potentials))]
    ExtraPotentials(Vec<String>),
    #[error("the potential for electrode {0} was given more than once")]
    #[diagnostic(code(transporter_poisson::potentials))]
    DuplicatePotential(String),
    #[error("could not find any electrodes in the geometry")]
    #[diagnostic(code(transporter_poisson::electrodes))]
    NoElectrodes,
    #[error("electrode {0} contains no sites")]
    #[diagnostic(code(transporter_poisson::electrodes))]
    EmptyElectrode(String),
    #[error("the electrode inclusion radius must be positive, got {0}")]
    #[diagnostic(code(transporter_poisson::electrodes))]
    NonPositiveRadius(f64),
    #[error("the solver tolerance must be positive, got {0}")]
    #[diagnostic(code(transporter_poisson::solver))]
    NonPositiveTolerance(f64),
    #[error("the solver needs at least one iteration")]
    #[diagnostic(code(transporter_poisson::solver))]
    ZeroIterationCap,
    #[error("the Krylov restart length must be at least one")]
    #[diagnostic(code(transporter_poisson::solver))]
    ZeroRestart,
    #[error("unknown acceleration method {0}")]
    #[diagnostic(
        code(transporter_poisson::solver),
        help("choose one of cg, cr, gmres, fgmres or bicgstab")
    )]
    UnknownAcceleration(String),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Mesher(#[from] MesherError),
}

#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum BuildError {
    #[error(transparent)]
    Csr(#[from] CsrError),
    #[error(transparent)]
    Mesh(#[from] MesherError),
}

#[derive(thiserror::Error, Debug, Diagnostic)]
/// General error for Csr construction, patterns and element access problems
pub enum CsrError {
    #[error("{0}")]
    Access(String),
    #[error(transparent)]
    Pattern(#[from] nalgebra_sparse::pattern::SparsityPatternFormatError),
    #[error("{0}")]
    Construction(String),
}

// The boxed source of a `SparseFormatError` is neither `Send` nor `Sync`
impl From<nalgebra_sparse::SparseFormatError> for CsrError {
    fn from(error: nalgebra_sparse::SparseFormatError) -> Self {
        CsrError::Construction(error.to_string())
    }
}

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Fatal errors raised by the solve pipeline
pub enum PoissonError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("the {pass} pass produced non-finite values ({count} in the solution)")]
    #[diagnostic(
        code(transporter_poisson::instability),
        help("Neumann faces are only approximated and may diverge, try another boundary condition")
    )]
    NumericalInstability { pass: SolvePass, count: usize },
}

impl From<CsrError> for PoissonError {
    fn from(error: CsrError) -> Self {
        PoissonError::Build(BuildError::Csr(error))
    }
}

impl From<MesherError> for PoissonError {
    fn from(error: MesherError) -> Self {
        PoissonError::Configuration(ConfigurationError::Mesher(error))
    }
}

#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq)]
#[error(
    "the {pass} pass stopped after {iterations} iterations at relative residual {residual:e}, \
     above the requested tolerance {tolerance:e}"
)]
#[diagnostic(
    code(transporter_poisson::convergence),
    severity(Warning),
    help("loosen the tolerance, raise the iteration cap or pick another acceleration method")
)]
/// Raised when a pass exhausts its iteration cap or stalls. The last iterate is still returned
pub struct ConvergenceWarning {
    pub pass: SolvePass,
    pub iterations: usize,
    pub residual: f64,
    pub tolerance: f64,
}
