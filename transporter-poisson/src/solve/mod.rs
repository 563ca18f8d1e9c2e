//! Iterative solution of the discretised system
//!
//! Every pass starts from the current values of the grid and solves for a correction with a
//! Jacobi scaled `kryst` Krylov method. As the grid already holds the electrode potentials and the
//! Dirichlet face values the pinned rows of the residual vanish, so the symmetric methods only ever
//! act on the block of free points. Convergence is judged on the residual recomputed from the
//! iterate, never on the recurrence estimate of the Krylov method.

mod krylov;

use krylov::{Monitor, Status};

use crate::error::{ConfigurationError, ConvergenceWarning, PoissonError, SolvePass};
use crate::operator::LinearSystem;
use nalgebra::DVector;
use serde::Deserialize;
use std::str::FromStr;
use transporter_mesher::{Grid, GridScalar};

/// The iterative method used to solve each pass
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub enum Acceleration {
    #[serde(rename = "cg")]
    ConjugateGradient,
    /// Conjugate residual, run as MINRES which minimises the same residual on symmetric operators
    #[serde(rename = "cr")]
    ConjugateResidual,
    #[serde(rename = "gmres")]
    Gmres,
    #[serde(rename = "fgmres")]
    FlexibleGmres,
    #[serde(rename = "bicgstab")]
    BiCgStab,
}

impl Default for Acceleration {
    fn default() -> Self {
        Acceleration::ConjugateGradient
    }
}

impl FromStr for Acceleration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cg" => Ok(Acceleration::ConjugateGradient),
            "cr" => Ok(Acceleration::ConjugateResidual),
            "gmres" => Ok(Acceleration::Gmres),
            "fgmres" => Ok(Acceleration::FlexibleGmres),
            "bicgstab" => Ok(Acceleration::BiCgStab),
            _ => Err(ConfigurationError::UnknownAcceleration(s.to_string())),
        }
    }
}

impl std::fmt::Display for Acceleration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Acceleration::ConjugateGradient => "cg",
            Acceleration::ConjugateResidual => "cr",
            Acceleration::Gmres => "gmres",
            Acceleration::FlexibleGmres => "fgmres",
            Acceleration::BiCgStab => "bicgstab",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SolverSettings<T> {
    /// Target for the relative residual `||b - A x|| / ||b||`
    pub tolerance: T,
    pub maximum_iterations: usize,
    #[serde(default)]
    pub acceleration: Acceleration,
    /// Size of the Krylov basis before the GMRES methods restart
    #[serde(default = "default_restart")]
    pub restart: usize,
}

fn default_restart() -> usize {
    30
}

impl<T: GridScalar> Default for SolverSettings<T> {
    fn default() -> Self {
        Self {
            tolerance: nalgebra::convert(1e-10),
            maximum_iterations: 10_000,
            acceleration: Acceleration::default(),
            restart: default_restart(),
        }
    }
}

impl<T: GridScalar> SolverSettings<T> {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.tolerance <= T::zero() {
            return Err(ConfigurationError::NonPositiveTolerance(
                self.tolerance.to_f64().unwrap_or(f64::NAN),
            ));
        }
        if self.maximum_iterations == 0 {
            return Err(ConfigurationError::ZeroIterationCap);
        }
        if self.restart == 0 {
            return Err(ConfigurationError::ZeroRestart);
        }
        Ok(())
    }
}

/// Diagnostics for a single solve pass
#[derive(Clone, Debug, PartialEq)]
pub struct PassReport<T> {
    pub pass: SolvePass,
    pub iterations: usize,
    /// Relative residuals, entry zero belongs to the initial guess
    pub residuals: Vec<T>,
    /// Set when the pass stopped before the residual reached the tolerance
    pub warning: Option<ConvergenceWarning>,
}

impl<T> PassReport<T> {
    pub fn converged(&self) -> bool {
        self.warning.is_none()
    }
}

#[derive(Debug)]
pub struct IterativeSolver<'a, T: GridScalar> {
    settings: &'a SolverSettings<T>,
    /// The requested tolerance, raised to the machine epsilon of `T` when it lies below
    tolerance: T,
}

impl<'a, T: GridScalar> IterativeSolver<'a, T> {
    pub fn new(settings: &'a SolverSettings<T>) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        let epsilon = T::default_epsilon();
        let tolerance = if settings.tolerance < epsilon {
            tracing::warn!(
                "A tolerance of {:e} is below the working precision, using {:e}",
                settings.tolerance.to_f64().unwrap_or(f64::NAN),
                epsilon.to_f64().unwrap_or(f64::NAN)
            );
            epsilon
        } else {
            settings.tolerance
        };
        Ok(Self {
            settings,
            tolerance,
        })
    }

    /// The tolerance passes are judged against
    pub fn tolerance(&self) -> T {
        self.tolerance
    }

    /// Solves `system` starting from the values held by `grid`, and writes the solution back
    ///
    /// A pass that exhausts the iteration cap or stalls is not an error, the last iterate is kept
    /// and the report carries a `ConvergenceWarning`. Non-finite values are an error and leave the grid
    /// untouched.
    #[tracing::instrument(name = "Iterative solve", level = "info", skip(self, system, grid))]
    pub fn solve(
        &self,
        system: &LinearSystem<T>,
        grid: &mut Grid<T>,
        pass: SolvePass,
    ) -> Result<PassReport<T>, PoissonError> {
        let (operator, source) = (system.operator(), system.source());
        let mut x = grid.values().clone();
        let mut monitor = Monitor::new(
            source.norm(),
            self.tolerance,
            self.settings.maximum_iterations,
        );

        tracing::info!("Solving the {pass} pass with {}", self.settings.acceleration);
        krylov::solve(
            operator,
            source,
            &mut x,
            self.settings.acceleration,
            self.settings.restart,
            &mut monitor,
        );

        let status = monitor.status();
        let iterations = monitor.iterations();
        let residuals = monitor.into_residuals();
        let count = count_non_finite(&x);
        if status == Status::NonFinite || count > 0 {
            return Err(PoissonError::NumericalInstability { pass, count });
        }

        let last = residuals.last().copied().unwrap_or_else(T::zero);
        let warning = if status == Status::Converged {
            tracing::info!(
                "The {pass} pass converged in {iterations} iterations, relative residual {:e}",
                last.to_f64().unwrap_or(f64::NAN)
            );
            None
        } else {
            let warning = ConvergenceWarning {
                pass,
                iterations,
                residual: last.to_f64().unwrap_or(f64::NAN),
                tolerance: self.tolerance.to_f64().unwrap_or(f64::NAN),
            };
            tracing::warn!("{warning}");
            Some(warning)
        };

        grid.values_mut().copy_from(&x);
        Ok(PassReport {
            pass,
            iterations,
            residuals,
            warning,
        })
    }
}

pub(crate) fn count_non_finite<T: GridScalar>(values: &DVector<T>) -> usize {
    values.iter().filter(|value| !value.is_finite()).count()
}
