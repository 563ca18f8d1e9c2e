use crate::{BoundaryConditions, BoundaryKind, Shape, Side};

/// The neighbour reached by a single stencil step from a grid point
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Neighbour {
    /// The step stays inside the box
    Core(usize),
    /// The step crosses a periodic face and lands on the opposite side of the box
    Wrapped(usize),
    /// The step leaves the box through a non-periodic face
    Boundary(BoundaryKind),
}

pub trait Connectivity {
    /// The neighbour of `point` one step along `axis` towards `side`
    fn neighbour(&self, point: [usize; 3], axis: usize, side: Side) -> Neighbour;

    /// Whether `point` lies on any face held at a fixed value
    fn is_on_dirichlet_face(&self, point: [usize; 3]) -> bool;
}

/// Nearest-neighbour connectivity of a rectilinear box
#[derive(Copy, Clone, Debug)]
pub struct BoxConnectivity<'a> {
    shape: &'a Shape,
    boundary: &'a BoundaryConditions,
}

impl<'a> BoxConnectivity<'a> {
    pub fn new(shape: &'a Shape, boundary: &'a BoundaryConditions) -> Self {
        Self { shape, boundary }
    }

    fn is_on_face(&self, point: [usize; 3], axis: usize, side: Side) -> bool {
        match side {
            Side::Low => point[axis] == 0,
            Side::High => point[axis] + 1 == self.shape.dims()[axis],
        }
    }
}

impl Connectivity for BoxConnectivity<'_> {
    fn neighbour(&self, point: [usize; 3], axis: usize, side: Side) -> Neighbour {
        let n = self.shape.dims()[axis];
        let mut target = point;
        if !self.is_on_face(point, axis, side) {
            target[axis] = match side {
                Side::Low => point[axis] - 1,
                Side::High => point[axis] + 1,
            };
            return Neighbour::Core(self.shape.index(target));
        }
        match self.boundary.kind(axis, side) {
            BoundaryKind::Periodic => {
                target[axis] = match side {
                    Side::Low => n - 1,
                    Side::High => 0,
                };
                Neighbour::Wrapped(self.shape.index(target))
            }
            kind => Neighbour::Boundary(kind),
        }
    }

    fn is_on_dirichlet_face(&self, point: [usize; 3]) -> bool {
        (0..3).any(|axis| {
            Side::BOTH.iter().any(|&side| {
                self.boundary.kind(axis, side) == BoundaryKind::Dirichlet
                    && self.is_on_face(point, axis, side)
            })
        })
    }
}

#[cfg(test)]
mod test {
    use super::{BoxConnectivity, Connectivity, Neighbour};
    use crate::{BoundaryConditions, BoundaryKind, Shape, Side};

    fn mixed_boundary() -> BoundaryConditions {
        BoundaryConditions::new([
            [BoundaryKind::Periodic, BoundaryKind::Periodic],
            [BoundaryKind::Neumann, BoundaryKind::Dirichlet],
            [BoundaryKind::Dirichlet, BoundaryKind::Neumann],
        ])
        .unwrap()
    }

    #[test]
    fn interior_steps_stay_in_the_core() {
        let shape = Shape::new([4, 4, 4]).unwrap();
        let boundary = mixed_boundary();
        let connectivity = BoxConnectivity::new(&shape, &boundary);
        assert_eq!(
            connectivity.neighbour([1, 2, 2], 0, Side::Low),
            Neighbour::Core(shape.index([0, 2, 2]))
        );
        assert_eq!(
            connectivity.neighbour([1, 2, 2], 2, Side::High),
            Neighbour::Core(shape.index([1, 2, 3]))
        );
    }

    #[test]
    fn periodic_faces_wrap_to_the_opposite_side() {
        let shape = Shape::new([4, 4, 4]).unwrap();
        let boundary = mixed_boundary();
        let connectivity = BoxConnectivity::new(&shape, &boundary);
        assert_eq!(
            connectivity.neighbour([0, 1, 1], 0, Side::Low),
            Neighbour::Wrapped(shape.index([3, 1, 1]))
        );
        assert_eq!(
            connectivity.neighbour([3, 1, 1], 0, Side::High),
            Neighbour::Wrapped(shape.index([0, 1, 1]))
        );
    }

    #[test]
    fn closed_faces_report_their_condition() {
        let shape = Shape::new([4, 4, 4]).unwrap();
        let boundary = mixed_boundary();
        let connectivity = BoxConnectivity::new(&shape, &boundary);
        assert_eq!(
            connectivity.neighbour([1, 0, 1], 1, Side::Low),
            Neighbour::Boundary(BoundaryKind::Neumann)
        );
        assert_eq!(
            connectivity.neighbour([1, 3, 1], 1, Side::High),
            Neighbour::Boundary(BoundaryKind::Dirichlet)
        );
    }

    #[test]
    fn dirichlet_membership_checks_every_axis() {
        let shape = Shape::new([4, 4, 4]).unwrap();
        let boundary = mixed_boundary();
        let connectivity = BoxConnectivity::new(&shape, &boundary);
        assert!(connectivity.is_on_dirichlet_face([1, 3, 1]));
        assert!(connectivity.is_on_dirichlet_face([1, 1, 0]));
        assert!(!connectivity.is_on_dirichlet_face([0, 0, 3]));
        assert!(!connectivity.is_on_dirichlet_face([2, 1, 2]));
    }
}
