//! The bridge between the grid system and the `kryst` Krylov solvers
//!
//! `kryst` works on a symmetrically Jacobi scaled copy of the operator in double precision. Each
//! sweep solves for a correction to the current iterate, after which the residual `b - A x` is
//! recomputed in the working precision and handed to the `Monitor`. Sweeps repeat until the
//! recomputed residual meets the tolerance, the iteration budget is spent or a sweep stalls.
use super::Acceleration;
use kryst::context::ksp_context::Workspace;
use kryst::matrix::op::CsrOp;
use kryst::matrix::sparse::CsrMatrix as KrystCsr;
use kryst::parallel::{NoComm, UniverseComm};
use kryst::preconditioner::PcSide;
use kryst::solver::LinearSolver;
use nalgebra::DVector;
use nalgebra_sparse::{CsrMatrix, SparseEntry};
use rayon::prelude::*;
use std::sync::Arc;
use transporter_mesher::GridScalar;

/// The outcome of recording a residual
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    Continue,
    Converged,
    Exhausted,
    Stalled,
    NonFinite,
}

/// Tracks the relative residual sequence of a single solve
#[derive(Debug)]
pub(crate) struct Monitor<T: GridScalar> {
    /// `||b||`, or one when the right hand side vanishes
    scale: T,
    tolerance: T,
    maximum_iterations: usize,
    iterations: usize,
    residuals: Vec<T>,
    status: Status,
}

impl<T: GridScalar> Monitor<T> {
    pub(crate) fn new(source_norm: T, tolerance: T, maximum_iterations: usize) -> Self {
        let scale = if source_norm > T::zero() {
            source_norm
        } else {
            T::one()
        };
        Self {
            scale,
            tolerance,
            maximum_iterations,
            iterations: 0,
            residuals: Vec::new(),
            status: Status::Continue,
        }
    }

    /// Records the true residual norm after a sweep of `iterations` Krylov steps, the first call
    /// records the initial guess
    pub(crate) fn record(&mut self, residual_norm: T, iterations: usize) -> Status {
        let relative = residual_norm / self.scale;
        let previous = self.residuals.last().copied();
        self.iterations += iterations;
        self.residuals.push(relative);
        tracing::debug!(
            "{:>6}  relative residual = {:.5e}",
            self.iterations,
            relative.to_f64().unwrap_or(f64::NAN)
        );
        self.status = if !relative.is_finite() {
            Status::NonFinite
        } else if relative <= self.tolerance {
            Status::Converged
        } else if self.iterations >= self.maximum_iterations {
            Status::Exhausted
        } else if previous.map_or(false, |previous| relative >= previous) {
            Status::Stalled
        } else {
            Status::Continue
        };
        self.status
    }

    pub(crate) fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn remaining(&self) -> usize {
        self.maximum_iterations.saturating_sub(self.iterations)
    }

    /// The relative tolerance a sweep needs to reach from a residual of norm `residual_norm`
    fn sweep_tolerance(&self, residual_norm: T) -> f64 {
        let target = (self.tolerance * self.scale / residual_norm)
            .to_f64()
            .unwrap_or(f64::EPSILON);
        target.clamp(f64::EPSILON, 0.5)
    }

    pub(crate) fn into_residuals(self) -> Vec<T> {
        self.residuals
    }
}

/// Symmetric diagonal scaling `D^-1/2 A D^-1/2`, rows with a vanishing diagonal are left unscaled
#[derive(Debug)]
pub(crate) struct Jacobi {
    inverse_root: Vec<f64>,
}

impl Jacobi {
    pub(crate) fn new<T: GridScalar>(operator: &CsrMatrix<T>) -> Self {
        let inverse_root = (0..operator.nrows())
            .map(|i| match operator.row(i).get_entry(i) {
                Some(SparseEntry::NonZero(value)) => {
                    let value = value.to_f64().unwrap_or(0.0).abs();
                    if value > 0.0 {
                        value.sqrt().recip()
                    } else {
                        1.0
                    }
                }
                _ => 1.0,
            })
            .collect();
        Self { inverse_root }
    }

    /// The scaled operator in the storage `kryst` works on
    pub(crate) fn scale_operator<T: GridScalar>(&self, operator: &CsrMatrix<T>) -> CsrOp {
        let offsets = operator.row_offsets();
        let columns = operator.col_indices();
        let values = operator.values();
        let scaled = (0..operator.nrows())
            .into_par_iter()
            .flat_map_iter(|row| {
                (offsets[row]..offsets[row + 1]).map(move |entry| {
                    values[entry].to_f64().unwrap_or(f64::NAN)
                        * self.inverse_root[row]
                        * self.inverse_root[columns[entry]]
                })
            })
            .collect::<Vec<_>>();
        let matrix = KrystCsr::from_csr(
            operator.nrows(),
            operator.ncols(),
            offsets.to_vec(),
            columns.to_vec(),
            scaled,
        );
        CsrOp::new(Arc::new(matrix))
    }

    fn scale<T: GridScalar>(&self, residual: &DVector<T>) -> Vec<f64> {
        residual
            .iter()
            .zip(&self.inverse_root)
            .map(|(value, scale)| value.to_f64().unwrap_or(f64::NAN) * scale)
            .collect()
    }

    fn unscale<T: GridScalar>(&self, scaled: &[f64]) -> DVector<T> {
        DVector::from_iterator(
            scaled.len(),
            scaled
                .iter()
                .zip(&self.inverse_root)
                .map(|(value, scale)| nalgebra::convert::<f64, T>(value * scale)),
        )
    }
}

/// Computes `y = A x`, rows are distributed over the rayon thread pool
pub(crate) fn spmv<T: GridScalar>(operator: &CsrMatrix<T>, x: &DVector<T>, y: &mut DVector<T>) {
    let offsets = operator.row_offsets();
    let columns = operator.col_indices();
    let values = operator.values();
    y.as_mut_slice()
        .par_iter_mut()
        .enumerate()
        .for_each(|(row, output)| {
            let mut sum = T::zero();
            for entry in offsets[row]..offsets[row + 1] {
                sum += values[entry] * x[columns[entry]];
            }
            *output = sum;
        });
}

/// The residual `b - A x` in the working precision
pub(crate) fn residual<T: GridScalar>(
    operator: &CsrMatrix<T>,
    b: &DVector<T>,
    x: &DVector<T>,
) -> DVector<T> {
    let mut ax = DVector::zeros(b.len());
    spmv(operator, x, &mut ax);
    b - ax
}

macro_rules! krylov_sweep {
    ($solver:expr, $operator:expr, $rhs:expr, $x:expr) => {
        krylov_sweep!($solver, $operator, $rhs, $x, None)
    };
    ($solver:expr, $operator:expr, $rhs:expr, $x:expr, $pc:expr) => {{
        let mut solver = $solver;
        let mut workspace = Workspace::new($rhs.len());
        solver.setup_workspace(&mut workspace);
        solver
            .solve(
                $operator,
                $pc,
                $rhs,
                $x,
                PcSide::Left,
                &UniverseComm::NoComm(NoComm {}),
                None,
                Some(&mut workspace),
            )
            .map(|stats| stats.iterations as usize)
            .map_err(|e| format!("{e:?}"))
    }};
}

/// Runs correction sweeps on `x` until the monitor stops them
pub(crate) fn solve<T: GridScalar>(
    operator: &CsrMatrix<T>,
    b: &DVector<T>,
    x: &mut DVector<T>,
    acceleration: Acceleration,
    restart: usize,
    monitor: &mut Monitor<T>,
) {
    let jacobi = Jacobi::new(operator);
    let scaled = jacobi.scale_operator(operator);

    let mut r = residual(operator, b, x);
    let mut norm = r.norm();
    let mut iterations = 0;
    while monitor.record(norm, iterations) == Status::Continue {
        let budget = monitor.remaining();
        let tolerance = monitor.sweep_tolerance(norm);
        let rhs = jacobi.scale(&r);
        let mut y = vec![0.0; rhs.len()];

        let outcome = match acceleration {
            Acceleration::ConjugateGradient => krylov_sweep!(
                kryst::solver::cg::CgSolver::new(tolerance, budget),
                &scaled,
                &rhs,
                &mut y
            ),
            Acceleration::ConjugateResidual => krylov_sweep!(
                kryst::solver::minres::MinresSolver::new(tolerance, budget),
                &scaled,
                &rhs,
                &mut y
            ),
            Acceleration::Gmres => krylov_sweep!(
                kryst::solver::gmres::GmresSolver::new(restart, tolerance, budget),
                &scaled,
                &rhs,
                &mut y,
                None::<&dyn kryst::ops::kpc::KPreconditioner<Scalar = f64>>
            ),
            Acceleration::FlexibleGmres => krylov_sweep!(
                kryst::solver::fgmres::FgmresSolver::new(tolerance, budget, restart),
                &scaled,
                &rhs,
                &mut y
            ),
            Acceleration::BiCgStab => krylov_sweep!(
                kryst::solver::bicgstab::BiCgStabSolver::new(tolerance, budget),
                &scaled,
                &rhs,
                &mut y
            ),
        };
        // An unconverged sweep still leaves a usable correction in `y`
        iterations = match outcome {
            Ok(iterations) => iterations.clamp(1, budget),
            Err(reason) => {
                tracing::debug!("Krylov sweep stopped early: {reason}");
                budget
            }
        };

        *x += jacobi.unscale::<T>(&y);
        r = residual(operator, b, x);
        norm = r.norm();
    }
}
