//! Discretisation of the Laplace equation on a grid
//!
//! The operator holds the negative seven point Laplacian along the three lattice directions, so
//! the block of free grid points is symmetric positive semi-definite. Rows on Dirichlet faces are
//! identity rows whose right hand side is the current field value on the face.

mod global;
mod local;

use global::CsrAssembler;
use local::VertexStencilAssembler;

use crate::error::BuildError;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use std::marker::PhantomData;
use transporter_mesher::{GridGeometry, GridScalar, MesherError};

/// The sparse system `A x = b` for one solve pass
#[derive(Clone, Debug)]
pub struct LinearSystem<T: GridScalar> {
    pub(crate) operator: CsrMatrix<T>,
    pub(crate) source: DVector<T>,
}

impl<T: GridScalar> LinearSystem<T> {
    pub fn operator(&self) -> &CsrMatrix<T> {
        &self.operator
    }

    pub fn source(&self) -> &DVector<T> {
        &self.source
    }

    pub fn into_parts(self) -> (CsrMatrix<T>, DVector<T>) {
        (self.operator, self.source)
    }
}

pub(crate) trait PoissonOperator {
    type Operator;
    type Source;
    fn build_operator(&self) -> Result<Self::Operator, BuildError>;
    fn build_source(&self) -> Result<Self::Source, BuildError>;
}

/// Builds the linear system for a grid from its metadata and, optionally, its current values
pub struct Discretizer<'a, T: GridScalar> {
    geometry: &'a GridGeometry<T>,
    field: Option<&'a DVector<T>>,
}

pub struct DiscretizerBuilder<T, RefGeometry, RefField> {
    geometry: RefGeometry,
    field: RefField,
    marker: PhantomData<T>,
}

impl<T> DiscretizerBuilder<T, (), ()> {
    pub fn new() -> Self {
        Self {
            geometry: (),
            field: (),
            marker: PhantomData,
        }
    }
}

impl<T> Default for DiscretizerBuilder<T, (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: GridScalar, RefGeometry, RefField> DiscretizerBuilder<T, RefGeometry, RefField> {
    pub fn with_geometry(
        self,
        geometry: &GridGeometry<T>,
    ) -> DiscretizerBuilder<T, &GridGeometry<T>, RefField> {
        DiscretizerBuilder {
            geometry,
            field: self.field,
            marker: PhantomData,
        }
    }

    /// Attach the current field, which supplies the values held on Dirichlet faces
    pub fn with_field(self, field: &DVector<T>) -> DiscretizerBuilder<T, RefGeometry, &DVector<T>> {
        DiscretizerBuilder {
            geometry: self.geometry,
            field,
            marker: PhantomData,
        }
    }
}

impl<'a, T: GridScalar> DiscretizerBuilder<T, &'a GridGeometry<T>, ()> {
    pub fn build(self) -> Discretizer<'a, T> {
        Discretizer {
            geometry: self.geometry,
            field: None,
        }
    }
}

impl<'a, T: GridScalar> DiscretizerBuilder<T, &'a GridGeometry<T>, &'a DVector<T>> {
    pub fn build(self) -> Result<Discretizer<'a, T>, BuildError> {
        if self.field.len() != self.geometry.num_points() {
            return Err(MesherError::ValueLength {
                expected: self.geometry.num_points(),
                found: self.field.len(),
            }
            .into());
        }
        Ok(Discretizer {
            geometry: self.geometry,
            field: Some(self.field),
        })
    }
}

impl<T: GridScalar> PoissonOperator for Discretizer<'_, T> {
    type Operator = CsrMatrix<T>;
    type Source = DVector<T>;

    fn build_operator(&self) -> Result<CsrMatrix<T>, BuildError> {
        let vertex_assembler = VertexStencilAssembler::new(self.geometry, self.field);
        let poisson_operator_constructor: CsrAssembler<T> =
            CsrAssembler::from_vertex_assembler(&vertex_assembler)?;
        poisson_operator_constructor.assemble_operator(&vertex_assembler)
    }

    fn build_source(&self) -> Result<DVector<T>, BuildError> {
        let vertex_assembler = VertexStencilAssembler::new(self.geometry, self.field);
        Ok(CsrAssembler::assemble_source(&vertex_assembler))
    }
}

impl<T: GridScalar> Discretizer<'_, T> {
    #[tracing::instrument(name = "Discretisation", level = "info", skip(self))]
    pub fn discretise(&self) -> Result<LinearSystem<T>, BuildError> {
        tracing::trace!("Assembling the Laplace operator");
        let operator = self.build_operator()?;
        tracing::trace!("Assembling the boundary source");
        let source = self.build_source()?;
        Ok(LinearSystem { operator, source })
    }
}
