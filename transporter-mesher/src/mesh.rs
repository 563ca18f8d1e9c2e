use crate::{BoundaryConditions, BoxConnectivity, Cell, GridScalar, MesherError, Side};
use nalgebra::{DVector, Point3, Vector3};

/// The number of grid points along each lattice direction
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape([usize; 3]);

impl Shape {
    pub fn new(dims: [usize; 3]) -> Result<Self, MesherError> {
        if dims.iter().any(|&n| n == 0) {
            return Err(MesherError::NonPositiveShape(dims));
        }
        Ok(Self(dims))
    }

    pub fn dims(&self) -> [usize; 3] {
        self.0
    }

    pub fn num_points(&self) -> usize {
        self.0.iter().product()
    }

    /// Flattens a 3D index, the last axis runs fastest
    pub fn index(&self, point: [usize; 3]) -> usize {
        let [_, ny, nz] = self.0;
        (point[0] * ny + point[1]) * nz + point[2]
    }

    pub fn unravel(&self, index: usize) -> [usize; 3] {
        let [_, ny, nz] = self.0;
        [index / (ny * nz), (index / nz) % ny, index % nz]
    }

    /// The flat indices of every point lying on one face of the box
    pub fn face_indices(&self, axis: usize, side: Side) -> Vec<usize> {
        let fixed = match side {
            Side::Low => 0,
            Side::High => self.0[axis] - 1,
        };
        let mut indices = Vec::with_capacity(self.num_points() / self.0[axis]);
        for index in 0..self.num_points() {
            if self.unravel(index)[axis] == fixed {
                indices.push(index);
            }
        }
        indices
    }
}

/// Everything needed to describe a grid except for the values it holds
///
/// The linear system for a solve pass is assembled from this metadata alone, the value array is
/// only allocated once there is something to put into it.
#[derive(Clone, Debug, PartialEq)]
pub struct GridGeometry<T: GridScalar> {
    shape: Shape,
    cell: Cell<T>,
    boundary: BoundaryConditions,
}

impl<T: GridScalar> GridGeometry<T> {
    pub fn new(shape: Shape, cell: Cell<T>, boundary: BoundaryConditions) -> Self {
        Self {
            shape,
            cell,
            boundary,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn cell(&self) -> &Cell<T> {
        &self.cell
    }

    pub fn boundary(&self) -> &BoundaryConditions {
        &self.boundary
    }

    pub fn num_points(&self) -> usize {
        self.shape.num_points()
    }

    pub fn connectivity(&self) -> BoxConnectivity<'_> {
        BoxConnectivity::new(&self.shape, &self.boundary)
    }

    /// The same grid with a different set of boundary conditions
    pub fn with_boundary(&self, boundary: BoundaryConditions) -> Self {
        Self {
            shape: self.shape,
            cell: self.cell.clone(),
            boundary,
        }
    }

    /// The same lattice sampled at a different resolution
    pub fn with_shape(&self, shape: Shape) -> Self {
        Self {
            shape,
            cell: self.cell.clone(),
            boundary: self.boundary,
        }
    }

    /// The fractional coordinate of the grid point at `point`
    pub fn fractional(&self, point: [usize; 3]) -> Vector3<T> {
        let dims = self.shape.dims();
        Vector3::from_fn(|axis, _| {
            nalgebra::convert::<f64, T>(point[axis] as f64 / dims[axis] as f64)
        })
    }

    pub fn position(&self, point: [usize; 3]) -> Point3<T> {
        self.cell.to_cartesian(&self.fractional(point))
    }

    /// Allocates a zeroed value array, completing the grid
    pub fn allocate(self) -> Grid<T> {
        let values = DVector::zeros(self.num_points());
        Grid {
            geometry: self,
            values,
        }
    }

    /// Completes the grid with `values`, which must be flattened in `Shape::index` order
    pub fn with_values(self, values: DVector<T>) -> Result<Grid<T>, MesherError> {
        if values.len() != self.num_points() {
            return Err(MesherError::ValueLength {
                expected: self.num_points(),
                found: values.len(),
            });
        }
        Ok(Grid {
            geometry: self,
            values,
        })
    }
}

/// A scalar field sampled on a `GridGeometry`. The grid owns its values exclusively
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T: GridScalar> {
    geometry: GridGeometry<T>,
    values: DVector<T>,
}

impl<T: GridScalar> Grid<T> {
    /// Callers must guarantee `values` has one entry per grid point
    pub(crate) fn from_parts(geometry: GridGeometry<T>, values: DVector<T>) -> Self {
        debug_assert_eq!(geometry.num_points(), values.len());
        Self { geometry, values }
    }

    pub fn geometry(&self) -> &GridGeometry<T> {
        &self.geometry
    }

    pub fn shape(&self) -> &Shape {
        self.geometry.shape()
    }

    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<T> {
        &mut self.values
    }

    pub fn get(&self, point: [usize; 3]) -> T {
        self.values[self.geometry.shape.index(point)]
    }

    pub fn set(&mut self, point: [usize; 3], value: T) {
        let index = self.geometry.shape.index(point);
        self.values[index] = value;
    }

    /// Swaps the boundary conditions while keeping the values
    pub fn set_boundary(&mut self, boundary: BoundaryConditions) {
        self.geometry.boundary = boundary;
    }

    pub fn into_parts(self) -> (GridGeometry<T>, DVector<T>) {
        (self.geometry, self.values)
    }
}

#[cfg(test)]
mod test {
    use super::{GridGeometry, Shape};
    use crate::{BoundaryConditions, Cell, MesherError, Side};
    use approx::assert_relative_eq;
    use nalgebra::{DVector, Point3};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn flattening_round_trips(nx in 1usize..8, ny in 1usize..8, nz in 1usize..8, seed in 0usize..10_000) {
            let shape = Shape::new([nx, ny, nz]).unwrap();
            let index = seed % shape.num_points();
            prop_assert_eq!(shape.index(shape.unravel(index)), index);
        }
    }

    #[test]
    fn last_axis_runs_fastest() {
        let shape = Shape::new([2, 3, 4]).unwrap();
        assert_eq!(shape.index([0, 0, 1]), 1);
        assert_eq!(shape.index([0, 1, 0]), 4);
        assert_eq!(shape.index([1, 0, 0]), 12);
    }

    #[test]
    fn zero_length_axis_is_rejected() {
        assert_eq!(
            Shape::new([4, 0, 2]),
            Err(MesherError::NonPositiveShape([4, 0, 2]))
        );
    }

    #[test]
    fn face_indices_cover_one_plane() {
        let shape = Shape::new([3, 4, 5]).unwrap();
        let face = shape.face_indices(1, Side::High);
        assert_eq!(face.len(), 15);
        assert!(face.iter().all(|&index| shape.unravel(index)[1] == 3));
    }

    #[test]
    fn grid_points_sit_at_fractions_of_the_lattice() {
        let cell = Cell::orthorhombic([10.0, 10.0, 20.0]).unwrap();
        let geometry = GridGeometry::new(
            Shape::new([10, 5, 4]).unwrap(),
            cell,
            BoundaryConditions::default(),
        );
        assert_relative_eq!(geometry.position([3, 1, 2]), Point3::new(3.0, 2.0, 10.0));
    }

    #[test]
    fn values_must_match_the_number_of_points() {
        let geometry = GridGeometry::new(
            Shape::new([2, 2, 2]).unwrap(),
            Cell::orthorhombic([1.0, 1.0, 1.0]).unwrap(),
            BoundaryConditions::default(),
        );
        let result = geometry.with_values(DVector::zeros(7));
        assert_eq!(
            result.unwrap_err(),
            MesherError::ValueLength {
                expected: 8,
                found: 7
            }
        );
    }
}
