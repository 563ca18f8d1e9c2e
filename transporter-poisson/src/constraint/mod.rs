//! Pins the grid points covered by each electrode to the electrode potential

use crate::device::Electrode;
use crate::error::{ConfigurationError, CsrError};
use crate::operator::LinearSystem;
use crate::region::{RegionTree, SplitPolicy};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use transporter_mesher::{Grid, GridGeometry, GridScalar};

/// Overwrites the rows of a linear system belonging to electrode regions with identity rows
///
/// Electrodes are applied in order, when two regions overlap the electrode applied last holds the
/// shared points.
#[derive(Debug)]
pub struct ConstraintInjector<'a, T: GridScalar> {
    electrodes: &'a [Electrode<T>],
    radius: T,
    policy: SplitPolicy,
}

impl<'a, T: GridScalar> ConstraintInjector<'a, T> {
    pub fn new(
        electrodes: &'a [Electrode<T>],
        radius: T,
        policy: SplitPolicy,
    ) -> Result<Self, ConfigurationError> {
        if radius <= T::zero() {
            return Err(ConfigurationError::NonPositiveRadius(
                radius.to_f64().unwrap_or(f64::NAN),
            ));
        }
        Ok(Self {
            electrodes,
            radius,
            policy,
        })
    }

    pub fn electrodes(&self) -> &[Electrode<T>] {
        self.electrodes
    }

    /// The grid points covered by `electrode`, truncated to the grid
    ///
    /// The region tree lives only for the duration of the call.
    pub fn pinned_indices(
        &self,
        electrode: &Electrode<T>,
        geometry: &GridGeometry<T>,
    ) -> Result<Vec<usize>, ConfigurationError> {
        let tree = RegionTree::from_electrode(electrode, self.radius, self.policy)?;
        Ok(tree.indices_within(geometry))
    }

    /// Pins every electrode region in `system`, writing the potentials into `grid` so the
    /// values double as the initial guess of the solver
    ///
    /// Returns the number of grid points claimed by each electrode, before later electrodes
    /// overwrite any of them.
    #[tracing::instrument(name = "Constraint injection", level = "info", skip_all)]
    pub fn inject(
        &self,
        system: &mut LinearSystem<T>,
        grid: &mut Grid<T>,
    ) -> Result<Vec<usize>, crate::error::PoissonError> {
        let mut counts = Vec::with_capacity(self.electrodes.len());
        for electrode in self.electrodes {
            let indices = self.pinned_indices(electrode, grid.geometry())?;
            tracing::info!(
                "Electrode {} fixes {} grid points at {}",
                electrode.name(),
                indices.len(),
                electrode.potential()
            );
            fix_rows(
                &mut system.operator,
                &mut system.source,
                &indices,
                electrode.potential(),
            )?;
            let values = grid.values_mut();
            for &index in &indices {
                values[index] = electrode.potential();
            }
            counts.push(indices.len());
        }
        Ok(counts)
    }
}

/// Replaces the rows at `indices` by identity rows and holds them at `value`
///
/// The sparsity pattern is left alone, off-diagonal entries are set to zero.
pub(crate) fn fix_rows<T: GridScalar>(
    operator: &mut CsrMatrix<T>,
    source: &mut DVector<T>,
    indices: &[usize],
    value: T,
) -> Result<(), CsrError> {
    for &index in indices {
        let mut row = operator.row_mut(index);
        let (columns, values) = row.cols_and_values_mut();
        let mut has_diagonal = false;
        for (&column, entry) in columns.iter().zip(values.iter_mut()) {
            if column == index {
                *entry = T::one();
                has_diagonal = true;
            } else {
                *entry = T::zero();
            }
        }
        if !has_diagonal {
            return Err(CsrError::Access(format!(
                "row {index} has no diagonal entry to fix"
            )));
        }
        source[index] = value;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::ConstraintInjector;
    use crate::device::Electrode;
    use crate::error::ConfigurationError;
    use crate::operator::DiscretizerBuilder;
    use crate::region::SplitPolicy;
    use nalgebra::Point3;
    use transporter_mesher::{BoundaryConditions, Cell, GridGeometry, Shape};

    fn geometry() -> GridGeometry<f64> {
        GridGeometry::new(
            Shape::new([8, 8, 8]).unwrap(),
            Cell::orthorhombic([8.0, 8.0, 8.0]).unwrap(),
            BoundaryConditions::default(),
        )
    }

    #[test]
    fn pinned_rows_become_identity_rows() {
        let geometry = geometry();
        let electrodes =
            vec![Electrode::new("Gate", vec![Point3::new(3.0, 3.0, 3.0)], 0.7).unwrap()];
        let injector = ConstraintInjector::new(&electrodes, 1.0, SplitPolicy::Index).unwrap();
        let mut system = DiscretizerBuilder::new()
            .with_geometry(&geometry)
            .build()
            .discretise()
            .unwrap();
        let mut grid = geometry.clone().allocate();

        let counts = injector.inject(&mut system, &mut grid).unwrap();
        // The centre and its six nearest neighbours
        assert_eq!(counts, vec![7]);

        let pinned = injector.pinned_indices(&electrodes[0], &geometry).unwrap();
        for &index in &pinned {
            let row = system.operator().row(index);
            for (&column, &value) in row.col_indices().iter().zip(row.values()) {
                let expected = if column == index { 1.0 } else { 0.0 };
                assert_eq!(value, expected);
            }
            assert_eq!(system.source()[index], 0.7);
            assert_eq!(grid.values()[index], 0.7);
        }
        let free = geometry.shape().index([6, 6, 6]);
        assert_eq!(system.source()[free], 0.0);
        assert_eq!(grid.values()[free], 0.0);
    }

    #[test]
    fn later_electrodes_win_shared_points() {
        let geometry = geometry();
        let electrodes = vec![
            Electrode::new("First", vec![Point3::new(3.0, 3.0, 3.0)], -1.0).unwrap(),
            Electrode::new("Second", vec![Point3::new(4.0, 3.0, 3.0)], 1.0).unwrap(),
        ];
        let injector = ConstraintInjector::new(&electrodes, 1.0, SplitPolicy::Index).unwrap();
        let mut system = DiscretizerBuilder::new()
            .with_geometry(&geometry)
            .build()
            .discretise()
            .unwrap();
        let mut grid = geometry.clone().allocate();
        injector.inject(&mut system, &mut grid).unwrap();

        let shared = geometry.shape().index([3, 3, 3]);
        assert_eq!(system.source()[shared], 1.0);
        assert_eq!(grid.get([3, 3, 3]), 1.0);
        assert_eq!(grid.get([2, 3, 3]), -1.0);
    }

    #[test]
    fn regions_outside_the_grid_are_truncated() {
        let geometry = geometry();
        let electrodes =
            vec![Electrode::new("Outside", vec![Point3::new(-1.0, 0.0, 0.0)], 2.0).unwrap()];
        let injector = ConstraintInjector::new(&electrodes, 1.0, SplitPolicy::Index).unwrap();
        let pinned = injector.pinned_indices(&electrodes[0], &geometry).unwrap();
        // Only the origin is within reach, the far face is not wrapped around
        assert_eq!(pinned, vec![0]);
    }

    #[test]
    fn radius_must_be_positive() {
        let electrodes: Vec<Electrode<f64>> = vec![];
        assert_eq!(
            ConstraintInjector::new(&electrodes, 0.0, SplitPolicy::Index).unwrap_err(),
            ConfigurationError::NonPositiveRadius(0.0)
        );
    }
}
