//! Vertex level constructors for the Poisson operator
//!
//! This submodule computes the stencil of a single grid point: the columns it couples to and the
//! coefficients of the negative Laplacian along the three lattice directions.
use nalgebra::DVector;
use transporter_mesher::{Connectivity, GridGeometry, GridScalar, Neighbour, Side};

/// Trait giving the information necessary to construct the sparsity pattern of the operator
pub(crate) trait VertexConnectivityAssembler {
    /// The number of vertices, or grid points, in the system
    fn num_vertices(&self) -> usize;
    /// Populates `output` with the indices of the vertices coupled to `vertex_index`, including
    /// the vertex itself. Indices may repeat
    fn populate_vertex_connections(&self, output: &mut Vec<usize>, vertex_index: usize);
}

/// Helper trait to construct one row of the operator
pub(crate) trait AssembleVertexMatrix<T: GridScalar>: VertexConnectivityAssembler {
    /// Fills `output` with `(column, coefficient)` pairs for the row at `vertex_index`. Pairs
    /// sharing a column are to be summed
    fn assemble_vertex_matrix_into(&self, output: &mut Vec<(usize, T)>, vertex_index: usize);
}

/// Helper trait to construct the right hand side
pub(crate) trait AssembleVertexSource<T: GridScalar>: VertexConnectivityAssembler {
    fn assemble_vertex_source(&self, vertex_index: usize) -> T;
}

#[derive(Debug, Clone)]
/// An assembler for the seven point stencil at a single grid point
pub(crate) struct VertexStencilAssembler<'a, T: GridScalar> {
    geometry: &'a GridGeometry<T>,
    /// Values held on Dirichlet faces. Faces are held at zero when there is no field yet
    field: Option<&'a DVector<T>>,
    /// `1 / h^2` along each lattice direction
    coefficients: [T; 3],
}

impl<'a, T: GridScalar> VertexStencilAssembler<'a, T> {
    pub(crate) fn new(geometry: &'a GridGeometry<T>, field: Option<&'a DVector<T>>) -> Self {
        let spacing = geometry.cell().spacing(geometry.shape());
        Self {
            geometry,
            field,
            coefficients: spacing.map(|h| T::one() / (h * h)),
        }
    }

    fn is_fixed(&self, point: [usize; 3]) -> bool {
        self.geometry.connectivity().is_on_dirichlet_face(point)
    }

    fn stencil(&self, output: &mut Vec<(usize, T)>, vertex_index: usize) {
        output.clear();
        let point = self.geometry.shape().unravel(vertex_index);
        if self.is_fixed(point) {
            output.push((vertex_index, T::one()));
            return;
        }

        let connectivity = self.geometry.connectivity();
        let mut diagonal = T::zero();
        for (axis, &coefficient) in self.coefficients.iter().enumerate() {
            for side in Side::BOTH {
                match connectivity.neighbour(point, axis, side) {
                    Neighbour::Core(column) => {
                        diagonal += coefficient;
                        output.push((column, -coefficient));
                    }
                    // A single point along a periodic axis is its own neighbour, the terms cancel
                    Neighbour::Wrapped(column) if column == vertex_index => {}
                    Neighbour::Wrapped(column) => {
                        diagonal += coefficient;
                        output.push((column, -coefficient));
                    }
                    // The ghost point beyond a Neumann face takes the value of the face point,
                    // so the direction drops out of the row. Dirichlet faces never get here as
                    // their rows are fixed above
                    Neighbour::Boundary(_) => {}
                }
            }
        }
        output.push((vertex_index, diagonal));
    }
}

impl<T: GridScalar> VertexConnectivityAssembler for VertexStencilAssembler<'_, T> {
    fn num_vertices(&self) -> usize {
        self.geometry.num_points()
    }

    fn populate_vertex_connections(&self, output: &mut Vec<usize>, vertex_index: usize) {
        let mut entries = Vec::with_capacity(7);
        self.stencil(&mut entries, vertex_index);
        output.clear();
        output.extend(entries.into_iter().map(|(column, _)| column));
    }
}

impl<T: GridScalar> AssembleVertexMatrix<T> for VertexStencilAssembler<'_, T> {
    fn assemble_vertex_matrix_into(&self, output: &mut Vec<(usize, T)>, vertex_index: usize) {
        self.stencil(output, vertex_index);
    }
}

impl<T: GridScalar> AssembleVertexSource<T> for VertexStencilAssembler<'_, T> {
    fn assemble_vertex_source(&self, vertex_index: usize) -> T {
        let point = self.geometry.shape().unravel(vertex_index);
        match self.field {
            Some(field) if self.is_fixed(point) => field[vertex_index],
            _ => T::zero(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{AssembleVertexMatrix, AssembleVertexSource, VertexStencilAssembler};
    use nalgebra::DVector;
    use transporter_mesher::{BoundaryConditions, BoundaryKind, Cell, GridGeometry, Shape};

    #[test]
    fn interior_row_holds_the_negative_laplacian() {
        let geometry = GridGeometry::new(
            Shape::new([4, 4, 4]).unwrap(),
            Cell::orthorhombic([4.0, 8.0, 2.0]).unwrap(),
            BoundaryConditions::default(),
        );
        let assembler = VertexStencilAssembler::new(&geometry, None);
        let mut row: Vec<(usize, f64)> = Vec::new();
        let vertex = geometry.shape().index([1, 1, 1]);
        assembler.assemble_vertex_matrix_into(&mut row, vertex);
        assert_eq!(row.len(), 7);
        let (column, diagonal) = row[6];
        assert_eq!(column, vertex);
        // h = (1, 2, 0.5) so the coefficients are (1, 0.25, 4)
        assert!((diagonal - 2.0 * (1.0 + 0.25 + 4.0)).abs() < 1e-12);
        let total: f64 = row.iter().map(|(_, value)| value).sum();
        assert!(total.abs() < 1e-12);
    }

    #[test]
    fn dirichlet_faces_take_their_value_from_the_field() {
        let geometry = GridGeometry::new(
            Shape::new([3, 3, 3]).unwrap(),
            Cell::orthorhombic([3.0, 3.0, 3.0]).unwrap(),
            BoundaryConditions::uniform(BoundaryKind::Dirichlet),
        );
        let field = DVector::from_fn(27, |i, _| i as f64);
        let assembler = VertexStencilAssembler::new(&geometry, Some(&field));
        let corner = geometry.shape().index([2, 0, 2]);
        let centre = geometry.shape().index([1, 1, 1]);

        let mut row = Vec::new();
        assembler.assemble_vertex_matrix_into(&mut row, corner);
        assert_eq!(row, vec![(corner, 1.0)]);
        assert_eq!(assembler.assemble_vertex_source(corner), corner as f64);
        assert_eq!(assembler.assemble_vertex_source(centre), 0.0);

        let unsolved = VertexStencilAssembler::new(&geometry, None);
        assert_eq!(unsolved.assemble_vertex_source(corner), 0.0);
    }
}
