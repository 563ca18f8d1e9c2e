//! Global assemblers for the `Poisson` system
//!
//! This module provides global assemblers for the Poisson operator, taking the stencils produced in
//! the local submodule and throwing them into a global CsrMatrix

use super::local::{AssembleVertexMatrix, AssembleVertexSource, VertexConnectivityAssembler};
use crate::error::{BuildError, CsrError};
use nalgebra::DVector;
use nalgebra_sparse::{pattern::SparsityPattern, CsrMatrix};
use std::cell::RefCell;
use transporter_mesher::GridScalar;

/// An assembler for CSR matrices.
#[derive(Debug, Clone)]
pub(crate) struct CsrAssembler<T: GridScalar> {
    // All members are buffers that help prevent unnecessary allocations
    // when assembling multiple matrices with the same assembler
    workspace: RefCell<CsrAssemblerWorkspace<T>>,
}

#[derive(Debug, Clone)]
struct CsrAssemblerWorkspace<T: GridScalar> {
    /// The complete SparsityPattern
    sparsity_pattern: SparsityPattern,
    /// Scratch space for the stencil of a single vertex
    vertex_matrix: Vec<(usize, T)>,
}

/// Initialisation methods for the CsrAssembler
///
/// Constructs a CsrAssembler from the vertex assembler, initialising the scratch space and
/// sparsity pattern
impl<T: GridScalar> CsrAssembler<T> {
    pub(crate) fn from_vertex_assembler<Assembler>(
        vertex_assembler: &Assembler,
    ) -> Result<Self, CsrError>
    where
        Assembler: VertexConnectivityAssembler,
    {
        let sparsity_pattern = CsrAssembler::<T>::assemble_sparsity_pattern(vertex_assembler)?;
        Ok(Self {
            workspace: RefCell::new(CsrAssemblerWorkspace {
                sparsity_pattern,
                vertex_matrix: Vec::with_capacity(7),
            }),
        })
    }

    /// Construct the full CsrMatrix sparsity pattern from the vertex assembler
    fn assemble_sparsity_pattern<Assembler>(
        vertex_assembler: &Assembler,
    ) -> Result<SparsityPattern, CsrError>
    where
        Assembler: VertexConnectivityAssembler,
    {
        let num_rows = vertex_assembler.num_vertices();

        let mut vertex_connections = Vec::with_capacity(7);
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(7 * num_rows);
        offsets.push(0);
        for i in 0..num_rows {
            vertex_assembler.populate_vertex_connections(&mut vertex_connections, i);
            vertex_connections.sort_unstable();
            vertex_connections.dedup();
            column_indices.extend_from_slice(&vertex_connections);
            offsets.push(column_indices.len());
        }
        tracing::trace!("Sparsity pattern holds {} entries", column_indices.len());

        Ok(SparsityPattern::try_from_offsets_and_indices(
            num_rows,
            num_rows,
            offsets,
            column_indices,
        )?)
    }
}

/// High level constructors used to initialise the linear system
impl<T: GridScalar> CsrAssembler<T> {
    /// Assembles the differential operator
    pub(crate) fn assemble_operator<Assembler>(
        &self,
        vertex_assembler: &Assembler,
    ) -> Result<CsrMatrix<T>, BuildError>
    where
        Assembler: AssembleVertexMatrix<T>,
    {
        let pattern = self.workspace.borrow().sparsity_pattern.clone();
        let initial_matrix_values = vec![T::zero(); pattern.nnz()];
        let mut matrix = CsrMatrix::try_from_pattern_and_values(pattern, initial_matrix_values)
            .map_err(CsrError::from)?;
        self.assemble_into_csr(&mut matrix, vertex_assembler)?;
        Ok(matrix)
    }

    /// Assembles the right hand side
    pub(crate) fn assemble_source<Assembler>(vertex_assembler: &Assembler) -> DVector<T>
    where
        Assembler: AssembleVertexSource<T>,
    {
        DVector::from_fn(vertex_assembler.num_vertices(), |vertex_index, _| {
            vertex_assembler.assemble_vertex_source(vertex_index)
        })
    }
}

/// Lower level constructors to compute the local assemblers for each vertex in the grid
impl<T: GridScalar> CsrAssembler<T> {
    fn assemble_into_csr<Assembler>(
        &self,
        csr: &mut CsrMatrix<T>,
        vertex_assembler: &Assembler,
    ) -> Result<(), CsrError>
    where
        Assembler: AssembleVertexMatrix<T>,
    {
        let mut workspace = self.workspace.borrow_mut();

        for n_row in 0..vertex_assembler.num_vertices() {
            vertex_assembler.assemble_vertex_matrix_into(&mut workspace.vertex_matrix, n_row);
            let mut csr_row = csr.row_mut(n_row);
            let (columns, values) = csr_row.cols_and_values_mut();
            add_row_to_csr_row(columns, values, &workspace.vertex_matrix)?;
        }

        Ok(())
    }
}

/// Adds a whole row to the CsrMatrix. The entries of `local_row` may come in any order and share
/// columns, but every column must already be present in the sparsity pattern
fn add_row_to_csr_row<T>(
    columns: &[usize],
    row_values: &mut [T],
    local_row: &[(usize, T)],
) -> Result<(), CsrError>
where
    T: GridScalar,
{
    for &(column, value) in local_row {
        let position = columns.binary_search(&column).map_err(|_| {
            CsrError::Access(format!("column {column} is missing from the sparsity pattern"))
        })?;
        row_values[position] += value;
    }
    Ok(())
}
