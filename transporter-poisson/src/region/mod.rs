//! Spatial index over the inclusion spheres of an electrode
//!
//! Every site of an electrode owns a sphere of the inclusion radius. A grid point is pinned to
//! the electrode potential when it lies in any of these spheres. The `RegionTree` stores the
//! spheres in a binary tree whose internal nodes hold a sphere enclosing both children, so a
//! containment query discards whole subtrees as soon as the point misses their bound.

use crate::device::Electrode;
use crate::error::ConfigurationError;
use nalgebra::Point3;
use serde::Deserialize;
use std::cmp::Ordering;
use std::ops::Range;
use transporter_mesher::{GridGeometry, GridScalar, Sphere};

/// How the site list is divided between the two children of a node
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Split the sites in list order, the first child takes the extra site when the count is odd
    Index,
    /// Split at the median along the direction in which the sites are most spread out
    Spatial,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        SplitPolicy::Index
    }
}

#[derive(Clone, Debug)]
pub enum RegionTree<T: GridScalar> {
    Leaf(Sphere<T>),
    Node {
        bound: Sphere<T>,
        children: Box<[RegionTree<T>; 2]>,
    },
}

impl<T: GridScalar> RegionTree<T> {
    /// Builds the tree for an electrode
    pub fn from_electrode(
        electrode: &Electrode<T>,
        radius: T,
        policy: SplitPolicy,
    ) -> Result<Self, ConfigurationError> {
        Self::build(electrode.positions(), radius, policy)
            .ok_or_else(|| ConfigurationError::EmptyElectrode(electrode.name().to_string()))
    }

    /// Builds the tree for spheres of `radius` centred on `positions`, or `None` when there
    /// are no positions
    pub fn build(positions: &[Point3<T>], radius: T, policy: SplitPolicy) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let mut order = (0..positions.len()).collect::<Vec<_>>();
        Some(Self::build_recursive(&mut order, positions, radius, policy))
    }

    fn build_recursive(
        order: &mut [usize],
        positions: &[Point3<T>],
        radius: T,
        policy: SplitPolicy,
    ) -> Self {
        if order.len() == 1 {
            return RegionTree::Leaf(Sphere::new(positions[order[0]], radius));
        }
        if policy == SplitPolicy::Spatial {
            let axis = widest_axis(order, positions);
            order.sort_by(|&a, &b| {
                positions[a][axis]
                    .partial_cmp(&positions[b][axis])
                    .unwrap_or(Ordering::Equal)
            });
        }
        let (first, second) = order.split_at_mut((order.len() + 1) / 2);
        let first = Self::build_recursive(first, positions, radius, policy);
        let second = Self::build_recursive(second, positions, radius, policy);
        // Enclosing spheres are grown a little so rounding never prunes a contained point
        let slack = T::default_epsilon() * nalgebra::convert::<f64, T>(64.0);
        let bound = first.bound().enclosing(second.bound()).inflated(slack);
        RegionTree::Node {
            bound,
            children: Box::new([first, second]),
        }
    }

    /// A sphere containing every leaf of the tree
    pub fn bound(&self) -> &Sphere<T> {
        match self {
            RegionTree::Leaf(sphere) => sphere,
            RegionTree::Node { bound, .. } => bound,
        }
    }

    pub fn num_leaves(&self) -> usize {
        match self {
            RegionTree::Leaf(_) => 1,
            RegionTree::Node { children, .. } => children.iter().map(|c| c.num_leaves()).sum(),
        }
    }

    /// Whether `point` lies within any leaf sphere
    pub fn contains(&self, point: &Point3<T>) -> bool {
        match self {
            RegionTree::Leaf(sphere) => sphere.contains(point),
            RegionTree::Node { bound, children } => {
                bound.contains(point) && children.iter().any(|child| child.contains(point))
            }
        }
    }

    /// The flat indices of all grid points inside the region, in ascending order
    ///
    /// Only points inside the grid are reported, the region is never wrapped across a
    /// periodic face.
    pub fn indices_within(&self, geometry: &GridGeometry<T>) -> Vec<usize> {
        let shape = geometry.shape();
        let dims = shape.dims();
        let bound = self.bound();
        let centre = geometry.cell().to_fractional(bound.center());
        let extent = geometry.cell().fractional_extent(bound.radius());

        let ranges = [0, 1, 2].map(|axis| {
            let n = nalgebra::convert::<f64, T>(dims[axis] as f64);
            candidate_range(
                (centre[axis] - extent[axis]) * n,
                (centre[axis] + extent[axis]) * n,
                dims[axis],
            )
        });

        let mut indices = Vec::new();
        for i in ranges[0].clone() {
            for j in ranges[1].clone() {
                for k in ranges[2].clone() {
                    if self.contains(&geometry.position([i, j, k])) {
                        indices.push(shape.index([i, j, k]));
                    }
                }
            }
        }
        indices
    }
}

/// The lattice direction along which the sites in `order` are most spread out
fn widest_axis<T: GridScalar>(order: &[usize], positions: &[Point3<T>]) -> usize {
    let spread = |axis: usize| {
        let (low, high) = order.iter().fold(
            (positions[order[0]][axis], positions[order[0]][axis]),
            |(low, high), &index| {
                let x = positions[index][axis];
                (low.min(x), high.max(x))
            },
        );
        high - low
    };
    let mut widest = 0;
    for axis in 1..3 {
        if spread(axis) > spread(widest) {
            widest = axis;
        }
    }
    widest
}

/// Grid indices which may fall between the fractional-index bounds `lower` and `upper`,
/// widened by one point each way and clamped to `0..n`
fn candidate_range<T: GridScalar>(lower: T, upper: T, n: usize) -> Range<usize> {
    let lower = lower.floor().to_isize().map_or(isize::MIN, |x| x.saturating_sub(1));
    let upper = upper.ceil().to_isize().map_or(isize::MAX, |x| x.saturating_add(1));
    if upper < 0 || lower >= n as isize {
        return 0..0;
    }
    let start = lower.max(0) as usize;
    let end = (upper as usize).min(n - 1) + 1;
    start..end
}
