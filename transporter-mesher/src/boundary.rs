use crate::MesherError;
use serde::Deserialize;

/// The kinds of condition which can be applied to a face of the simulation box
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    /// The domain wraps onto the opposite face
    Periodic,
    /// The field is fixed on the face
    Dirichlet,
    /// The normal derivative of the field vanishes on the face
    Neumann,
}

/// The lower or upper face of an axis
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Low,
    High,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Low, Side::High];

    fn as_index(self) -> usize {
        match self {
            Side::Low => 0,
            Side::High => 1,
        }
    }
}

/// Boundary conditions for the three lattice directions, stored as `(low, high)` pairs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoundaryConditions([[BoundaryKind; 2]; 3]);

impl Default for BoundaryConditions {
    fn default() -> Self {
        Self::uniform(BoundaryKind::Periodic)
    }
}

impl BoundaryConditions {
    /// Validates and wraps a full boundary table
    ///
    /// A periodic face is only meaningful when the opposite face on the same axis is also
    /// periodic, anything else is rejected.
    pub fn new(axes: [[BoundaryKind; 2]; 3]) -> Result<Self, MesherError> {
        for (axis, [low, high]) in axes.iter().enumerate() {
            let low_periodic = *low == BoundaryKind::Periodic;
            let high_periodic = *high == BoundaryKind::Periodic;
            if low_periodic != high_periodic {
                return Err(MesherError::UnpairedPeriodic(axis));
            }
        }
        Ok(Self(axes))
    }

    /// Builds the table from a deserialised list of `(low, high)` pairs, which must have exactly
    /// three entries
    pub fn try_from_pairs(pairs: &[[BoundaryKind; 2]]) -> Result<Self, MesherError> {
        let axes: [[BoundaryKind; 2]; 3] = pairs
            .try_into()
            .map_err(|_| MesherError::BoundaryArity(pairs.len()))?;
        Self::new(axes)
    }

    /// The same condition on all six faces
    pub fn uniform(kind: BoundaryKind) -> Self {
        Self([[kind; 2]; 3])
    }

    pub fn kind(&self, axis: usize, side: Side) -> BoundaryKind {
        self.0[axis][side.as_index()]
    }

    pub fn axis(&self, axis: usize) -> [BoundaryKind; 2] {
        self.0[axis]
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.0[axis][0] == BoundaryKind::Periodic
    }

    pub fn has(&self, kind: BoundaryKind) -> bool {
        self.0.iter().flatten().any(|&face| face == kind)
    }
}
