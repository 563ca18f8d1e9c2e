//! The full constrained solve, from an empty grid to the field handed back to the caller
//!
//! A solve runs in up to two passes. The linear system is assembled from the grid metadata before
//! the value array exists, the electrodes are pinned, and the system is solved under the caller's
//! boundary conditions. The optional correction pass then re-solves inside a Dirichlet box built
//! from the first solution. Each system is released before the next one is assembled.

use crate::constraint::ConstraintInjector;
use crate::correction::BoundaryCorrector;
use crate::device::Electrode;
use crate::error::{ConvergenceWarning, PoissonError, SolvePass};
use crate::operator::DiscretizerBuilder;
use crate::region::SplitPolicy;
use crate::solve::{IterativeSolver, PassReport, SolverSettings};
use serde::Deserialize;
use std::marker::PhantomData;
use transporter_mesher::{Grid, GridGeometry, GridResampler, GridScalar, Shape};

/// How far the solve has progressed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// No iterative pass has run, the field holds the constraint values only
    Unsolved,
    /// The initial pass has run under the caller's boundary conditions
    BoundaryUncorrected,
    /// The boundary correction pass has run
    Final,
}

/// Geometric settings for turning electrode sites into pinned grid points
#[derive(Clone, Debug, Deserialize)]
pub struct ElectrodeSettings<T> {
    /// Grid points closer than this to a site of an electrode are held at its potential
    pub radius: T,
    #[serde(default)]
    pub split: SplitPolicy,
}

/// Switches selecting which passes run
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Workflow {
    /// Skip the iterative solve and return the constraint vector
    #[serde(default)]
    pub box_only: bool,
    #[serde(default = "enabled")]
    pub boundary_correction: bool,
    /// Pin the electrodes again during the correction pass. The first pass then already solves
    /// the correction system, so the field is left as it was
    #[serde(default)]
    pub repin_electrodes: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            box_only: false,
            boundary_correction: true,
            repin_electrodes: false,
        }
    }
}

/// The result of a solve
#[derive(Clone, Debug)]
pub struct Solution<T: GridScalar> {
    field: Grid<T>,
    resampled: Option<Grid<T>>,
    stage: Stage,
    reports: Vec<PassReport<T>>,
    pinned: Vec<usize>,
}

impl<T: GridScalar> Solution<T> {
    /// The field at the working resolution of the solver
    pub fn field(&self) -> &Grid<T> {
        &self.field
    }

    /// The field at the requested output resolution
    pub fn output(&self) -> &Grid<T> {
        self.resampled.as_ref().unwrap_or(&self.field)
    }

    pub fn into_output(self) -> Grid<T> {
        self.resampled.unwrap_or(self.field)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// One report per pass, in the order the passes ran
    pub fn reports(&self) -> &[PassReport<T>] {
        &self.reports
    }

    /// The number of grid points claimed by each electrode in the initial pass
    pub fn pinned(&self) -> &[usize] {
        &self.pinned
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConvergenceWarning> {
        self.reports
            .iter()
            .filter_map(|report| report.warning.as_ref())
    }
}

/// A constrained Poisson problem, ready to solve
pub struct PoissonProblem<'a, T: GridScalar> {
    geometry: &'a GridGeometry<T>,
    electrodes: &'a [Electrode<T>],
    electrode_settings: &'a ElectrodeSettings<T>,
    solver_settings: &'a SolverSettings<T>,
    workflow: Workflow,
    output_shape: Option<Shape>,
}

pub struct PoissonProblemBuilder<T, RefGeometry, RefElectrodes, RefElectrodeSettings, RefSolverSettings>
{
    geometry: RefGeometry,
    electrodes: RefElectrodes,
    electrode_settings: RefElectrodeSettings,
    solver_settings: RefSolverSettings,
    workflow: Workflow,
    output_shape: Option<Shape>,
    marker: PhantomData<T>,
}

impl<T> PoissonProblemBuilder<T, (), (), (), ()> {
    pub fn new() -> Self {
        Self {
            geometry: (),
            electrodes: (),
            electrode_settings: (),
            solver_settings: (),
            workflow: Workflow::default(),
            output_shape: None,
            marker: PhantomData,
        }
    }
}

impl<T> Default for PoissonProblemBuilder<T, (), (), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: GridScalar, RefGeometry, RefElectrodes, RefElectrodeSettings, RefSolverSettings>
    PoissonProblemBuilder<T, RefGeometry, RefElectrodes, RefElectrodeSettings, RefSolverSettings>
{
    /// The working grid, whose boundary conditions apply to the initial pass
    pub fn with_geometry(
        self,
        geometry: &GridGeometry<T>,
    ) -> PoissonProblemBuilder<
        T,
        &GridGeometry<T>,
        RefElectrodes,
        RefElectrodeSettings,
        RefSolverSettings,
    > {
        PoissonProblemBuilder {
            geometry,
            electrodes: self.electrodes,
            electrode_settings: self.electrode_settings,
            solver_settings: self.solver_settings,
            workflow: self.workflow,
            output_shape: self.output_shape,
            marker: PhantomData,
        }
    }

    /// Electrodes in the order their constraints are applied
    pub fn with_electrodes(
        self,
        electrodes: &[Electrode<T>],
    ) -> PoissonProblemBuilder<
        T,
        RefGeometry,
        &[Electrode<T>],
        RefElectrodeSettings,
        RefSolverSettings,
    > {
        PoissonProblemBuilder {
            geometry: self.geometry,
            electrodes,
            electrode_settings: self.electrode_settings,
            solver_settings: self.solver_settings,
            workflow: self.workflow,
            output_shape: self.output_shape,
            marker: PhantomData,
        }
    }

    pub fn with_electrode_settings(
        self,
        electrode_settings: &ElectrodeSettings<T>,
    ) -> PoissonProblemBuilder<
        T,
        RefGeometry,
        RefElectrodes,
        &ElectrodeSettings<T>,
        RefSolverSettings,
    > {
        PoissonProblemBuilder {
            geometry: self.geometry,
            electrodes: self.electrodes,
            electrode_settings,
            solver_settings: self.solver_settings,
            workflow: self.workflow,
            output_shape: self.output_shape,
            marker: PhantomData,
        }
    }

    pub fn with_solver_settings(
        self,
        solver_settings: &SolverSettings<T>,
    ) -> PoissonProblemBuilder<
        T,
        RefGeometry,
        RefElectrodes,
        RefElectrodeSettings,
        &SolverSettings<T>,
    > {
        PoissonProblemBuilder {
            geometry: self.geometry,
            electrodes: self.electrodes,
            electrode_settings: self.electrode_settings,
            solver_settings,
            workflow: self.workflow,
            output_shape: self.output_shape,
            marker: PhantomData,
        }
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = workflow;
        self
    }

    /// Resample the solved field to `shape` before returning it
    pub fn with_output_shape(mut self, shape: Shape) -> Self {
        self.output_shape = Some(shape);
        self
    }
}

impl<'a, T: GridScalar>
    PoissonProblemBuilder<
        T,
        &'a GridGeometry<T>,
        &'a [Electrode<T>],
        &'a ElectrodeSettings<T>,
        &'a SolverSettings<T>,
    >
{
    pub fn build(self) -> PoissonProblem<'a, T> {
        PoissonProblem {
            geometry: self.geometry,
            electrodes: self.electrodes,
            electrode_settings: self.electrode_settings,
            solver_settings: self.solver_settings,
            workflow: self.workflow,
            output_shape: self.output_shape,
        }
    }
}

impl<'a, T: GridScalar> PoissonProblem<'a, T> {
    /// Runs every requested pass and returns the field with its diagnostics
    ///
    /// All settings are validated before any matrix is assembled. A pass producing non-finite
    /// values aborts the solve, so the correction never starts from a corrupted field.
    #[tracing::instrument(name = "Poisson solve", level = "info", skip(self))]
    pub fn solve(&self) -> Result<Solution<T>, PoissonError> {
        let solver = IterativeSolver::new(self.solver_settings)?;
        let injector = ConstraintInjector::new(
            self.electrodes,
            self.electrode_settings.radius,
            self.electrode_settings.split,
        )?;

        let mut system = DiscretizerBuilder::new()
            .with_geometry(self.geometry)
            .build()
            .discretise()?;
        let mut field = self.geometry.clone().allocate();
        let pinned = injector.inject(&mut system, &mut field)?;

        let mut stage = Stage::Unsolved;
        let mut reports = Vec::with_capacity(2);
        if self.workflow.box_only {
            tracing::info!("Returning the constraint vector without solving");
            field.values_mut().copy_from(system.source());
            reports.push(PassReport {
                pass: SolvePass::Initial,
                iterations: 0,
                residuals: Vec::new(),
                warning: None,
            });
        } else {
            reports.push(solver.solve(&system, &mut field, SolvePass::Initial)?);
            stage = Stage::BoundaryUncorrected;
        }
        drop(system);

        if !self.workflow.box_only && self.workflow.boundary_correction {
            let mut corrector = BoundaryCorrector::new(&solver);
            if self.workflow.repin_electrodes {
                corrector = corrector.with_injector(&injector);
            }
            reports.push(corrector.correct(&mut field)?);
            stage = Stage::Final;
        }

        let resampled = match self.output_shape {
            Some(shape) if shape != *field.shape() => {
                tracing::info!(
                    "Resampling from {:?} to {:?}",
                    field.shape().dims(),
                    shape.dims()
                );
                Some(GridResampler::new(shape).resample(&field))
            }
            _ => None,
        };

        Ok(Solution {
            field,
            resampled,
            stage,
            reports,
            pinned,
        })
    }
}
