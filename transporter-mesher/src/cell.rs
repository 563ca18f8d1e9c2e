use crate::{GridScalar, MesherError, Shape};
use nalgebra::{Matrix3, Point3, Vector3};

/// The lattice spanned by a grid
///
/// Rows of `vectors` are the three lattice vectors. A grid point with integer index `(i, j, k)`
/// in a grid of shape `(nx, ny, nz)` sits at fractional coordinate `(i / nx, j / ny, k / nz)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell<T: GridScalar> {
    vectors: Matrix3<T>,
    /// Maps cartesian positions onto fractional coordinates, the inverse transpose of `vectors`
    reciprocal: Matrix3<T>,
}

impl<T: GridScalar> Cell<T> {
    pub fn new(vectors: Matrix3<T>) -> Result<Self, MesherError> {
        let reciprocal = vectors
            .transpose()
            .try_inverse()
            .ok_or(MesherError::SingularCell)?;
        Ok(Self {
            vectors,
            reciprocal,
        })
    }

    pub fn from_rows(rows: &[[T; 3]; 3]) -> Result<Self, MesherError> {
        Self::new(Matrix3::from_fn(|row, column| rows[row][column]))
    }

    /// A cell with mutually orthogonal lattice vectors of the given lengths
    pub fn orthorhombic(lengths: [T; 3]) -> Result<Self, MesherError> {
        Self::new(Matrix3::from_diagonal(&Vector3::from(lengths)))
    }

    pub fn vectors(&self) -> &Matrix3<T> {
        &self.vectors
    }

    pub fn length(&self, axis: usize) -> T {
        self.vectors.row(axis).norm()
    }

    /// The distance between adjacent grid points along each lattice direction
    pub fn spacing(&self, shape: &Shape) -> [T; 3] {
        let dims = shape.dims();
        [0, 1, 2].map(|axis| self.length(axis) / nalgebra::convert::<f64, T>(dims[axis] as f64))
    }

    pub fn to_cartesian(&self, fractional: &Vector3<T>) -> Point3<T> {
        Point3::from(self.vectors.transpose() * fractional)
    }

    pub fn to_fractional(&self, point: &Point3<T>) -> Vector3<T> {
        self.reciprocal * point.coords
    }

    /// The half-width, in fractional coordinates, of a sphere of `radius` along each lattice
    /// direction
    pub fn fractional_extent(&self, radius: T) -> Vector3<T> {
        Vector3::from_fn(|axis, _| self.reciprocal.row(axis).norm() * radius)
    }
}

#[cfg(test)]
mod test {
    use super::Cell;
    use crate::{MesherError, Shape};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Point3, Vector3};

    #[test]
    fn fractional_and_cartesian_maps_are_inverse() {
        let cell = Cell::from_rows(&[[4.0, 0.0, 0.0], [1.0, 3.0, 0.0], [0.5, 0.5, 6.0]]).unwrap();
        let point = Point3::new(1.3, -0.7, 2.2);
        let fractional = cell.to_fractional(&point);
        let back = cell.to_cartesian(&fractional);
        assert_relative_eq!(back, point, epsilon = 1e-12);
    }

    #[test]
    fn spacing_divides_vector_length_by_points() {
        let cell = Cell::orthorhombic([10.0, 20.0, 5.0]).unwrap();
        let shape = Shape::new([10, 40, 5]).unwrap();
        let spacing = cell.spacing(&shape);
        assert_relative_eq!(spacing[0], 1.0);
        assert_relative_eq!(spacing[1], 0.5);
        assert_relative_eq!(spacing[2], 1.0);
    }

    #[test]
    fn sphere_extent_in_orthorhombic_cell_scales_with_inverse_length() {
        let cell = Cell::orthorhombic([10.0, 20.0, 5.0]).unwrap();
        let extent = cell.fractional_extent(2.0);
        assert_relative_eq!(extent, Vector3::new(0.2, 0.1, 0.4), epsilon = 1e-12);
    }

    #[test]
    fn dependent_lattice_vectors_are_rejected() {
        let vectors = Matrix3::new(1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        assert_eq!(Cell::<f64>::new(vectors), Err(MesherError::SingularCell));
    }
}
