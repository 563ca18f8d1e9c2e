//! The second solve pass, which fixes every face of the box to the values found by the first

use crate::constraint::ConstraintInjector;
use crate::error::{PoissonError, SolvePass};
use crate::operator::DiscretizerBuilder;
use crate::solve::{IterativeSolver, PassReport};
use transporter_mesher::{BoundaryConditions, BoundaryKind, Grid, GridScalar};

/// Re-solves a grid inside a pure Dirichlet box
///
/// When an injector is attached the electrode regions are pinned again on top of the box
/// faces, otherwise only the faces are held.
#[derive(Debug)]
pub struct BoundaryCorrector<'a, T: GridScalar> {
    solver: &'a IterativeSolver<'a, T>,
    injector: Option<&'a ConstraintInjector<'a, T>>,
}

impl<'a, T: GridScalar> BoundaryCorrector<'a, T> {
    pub fn new(solver: &'a IterativeSolver<'a, T>) -> Self {
        Self {
            solver,
            injector: None,
        }
    }

    pub fn with_injector(mut self, injector: &'a ConstraintInjector<'a, T>) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Runs the correction pass in place, leaving `grid` with Dirichlet conditions on all faces
    #[tracing::instrument(name = "Boundary correction", level = "info", skip_all)]
    pub fn correct(&self, grid: &mut Grid<T>) -> Result<PassReport<T>, PoissonError> {
        let boundary = BoundaryConditions::uniform(BoundaryKind::Dirichlet);
        let geometry = grid.geometry().with_boundary(boundary);
        let mut system = DiscretizerBuilder::new()
            .with_geometry(&geometry)
            .with_field(grid.values())
            .build()?
            .discretise()?;
        grid.set_boundary(boundary);

        if let Some(injector) = self.injector {
            tracing::trace!("Pinning the electrodes inside the Dirichlet box");
            injector.inject(&mut system, grid)?;
        }

        let report = self
            .solver
            .solve(&system, grid, SolvePass::BoundaryCorrection)?;
        drop(system);
        Ok(report)
    }
}
