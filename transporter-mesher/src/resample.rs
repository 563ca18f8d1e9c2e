use crate::{BoundaryConditions, Grid, GridScalar, Shape};
use nalgebra::DVector;

/// Interpolation stencil along one axis of the target grid
///
/// Target point `j` of `m` lies at source coordinate `s = j * n / m`, it blends the source points
/// `lower[j]` and `upper[j]` with weight `weight[j]` on the upper point.
#[derive(Debug)]
struct AxisTable {
    lower: Vec<usize>,
    upper: Vec<usize>,
    weight: Vec<f64>,
}

impl AxisTable {
    fn new(source: usize, target: usize, periodic: bool) -> Self {
        let mut lower = Vec::with_capacity(target);
        let mut upper = Vec::with_capacity(target);
        let mut weight = Vec::with_capacity(target);
        for j in 0..target {
            let s = (j * source) as f64 / target as f64;
            let base = s.floor() as usize;
            let fraction = s - base as f64;
            let (i0, i1, w) = if periodic {
                (base % source, (base + 1) % source, fraction)
            } else if base + 1 >= source {
                // Past the last source point the field is held constant
                (source - 1, source - 1, 0.0)
            } else {
                (base, base + 1, fraction)
            };
            lower.push(i0);
            upper.push(i1);
            weight.push(w);
        }
        Self {
            lower,
            upper,
            weight,
        }
    }
}

/// Trilinear interpolation of a grid onto a new resolution over the same lattice
///
/// Each axis is treated independently, so the target may be finer along one direction and
/// coarser along another. Periodic axes interpolate across the wrapped face, all other axes
/// are clamped at the last grid point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridResampler {
    target: Shape,
}

impl GridResampler {
    pub fn new(target: Shape) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Shape {
        &self.target
    }

    pub fn resample<T: GridScalar>(&self, grid: &Grid<T>) -> Grid<T> {
        if grid.shape() == &self.target {
            return grid.clone();
        }
        let source = grid.shape().dims();
        let target = self.target.dims();
        let boundary: &BoundaryConditions = grid.geometry().boundary();
        let tables: Vec<AxisTable> = (0..3)
            .map(|axis| AxisTable::new(source[axis], target[axis], boundary.is_periodic(axis)))
            .collect();

        let mut values = DVector::zeros(self.target.num_points());
        for (index, value) in values.iter_mut().enumerate() {
            let point = self.target.unravel(index);
            let mut accumulated = T::zero();
            for corner in 0..8 {
                let mut weight = 1.0;
                let mut source_point = [0; 3];
                for (axis, table) in tables.iter().enumerate() {
                    let j = point[axis];
                    let w = table.weight[j];
                    if corner & (1 << axis) == 0 {
                        source_point[axis] = table.lower[j];
                        weight *= 1.0 - w;
                    } else {
                        source_point[axis] = table.upper[j];
                        weight *= w;
                    }
                }
                if weight != 0.0 {
                    accumulated += grid.get(source_point) * nalgebra::convert::<f64, T>(weight);
                }
            }
            *value = accumulated;
        }

        Grid::from_parts(grid.geometry().with_shape(self.target), values)
    }
}

#[cfg(test)]
mod test {
    use super::GridResampler;
    use crate::{BoundaryConditions, BoundaryKind, Cell, Grid, GridGeometry, Shape};
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::f64::consts::PI;

    fn geometry(dims: [usize; 3], boundary: BoundaryConditions) -> GridGeometry<f64> {
        GridGeometry::new(
            Shape::new(dims).unwrap(),
            Cell::orthorhombic([12.0, 12.0, 4.0]).unwrap(),
            boundary,
        )
    }

    fn wavy(dims: [usize; 3]) -> Grid<f64> {
        let geometry = geometry(dims, BoundaryConditions::default());
        let shape = *geometry.shape();
        let values = DVector::from_fn(shape.num_points(), |index, _| {
            let [i, j, _] = shape.unravel(index);
            (2. * PI * i as f64 / dims[0] as f64).sin() + (2. * PI * j as f64 / dims[1] as f64).cos()
        });
        geometry.with_values(values).unwrap()
    }

    #[test]
    fn upsample_then_downsample_recovers_the_field() {
        let original = wavy([24, 24, 8]);
        let fine = GridResampler::new(Shape::new([48, 30, 12]).unwrap()).resample(&original);
        assert_eq!(fine.shape().dims(), [48, 30, 12]);
        let back = GridResampler::new(*original.shape()).resample(&fine);
        for (a, b) in back.values().iter().zip(original.values().iter()) {
            assert!((a - b).abs() < 0.05, "{a} differs from {b}");
        }
    }

    #[test]
    fn integer_refinement_round_trips_exactly() {
        let original = wavy([12, 8, 4]);
        let fine = GridResampler::new(Shape::new([36, 16, 8]).unwrap()).resample(&original);
        let back = GridResampler::new(*original.shape()).resample(&fine);
        assert_relative_eq!(back.values(), original.values(), epsilon = 1e-12);
    }

    #[test]
    fn constant_field_is_preserved_in_every_direction() {
        let boundary = BoundaryConditions::uniform(BoundaryKind::Dirichlet);
        let grid = geometry([5, 7, 3], boundary)
            .with_values(DVector::from_element(105, 2.5))
            .unwrap();
        let resampled = GridResampler::new(Shape::new([9, 4, 6]).unwrap()).resample(&grid);
        assert!(resampled.values().iter().all(|&v| (v - 2.5).abs() < 1e-12));
        assert_eq!(resampled.geometry().boundary(), &boundary);
    }

    #[test]
    fn periodic_axis_interpolates_across_the_wrapped_face() {
        let geometry = geometry([2, 1, 1], BoundaryConditions::default());
        let grid = geometry.with_values(DVector::from_vec(vec![0.0, 1.0])).unwrap();
        let resampled = GridResampler::new(Shape::new([4, 1, 1]).unwrap()).resample(&grid);
        assert_relative_eq!(
            resampled.values(),
            &DVector::from_vec(vec![0.0, 0.5, 1.0, 0.5])
        );
    }

    #[test]
    fn closed_axis_is_clamped_at_the_last_point() {
        let boundary = BoundaryConditions::uniform(BoundaryKind::Neumann);
        let grid = geometry([2, 1, 1], boundary)
            .with_values(DVector::from_vec(vec![0.0, 1.0]))
            .unwrap();
        let resampled = GridResampler::new(Shape::new([4, 1, 1]).unwrap()).resample(&grid);
        assert_relative_eq!(
            resampled.values(),
            &DVector::from_vec(vec![0.0, 0.5, 1.0, 1.0])
        );
    }
}
