use crate::GridScalar;
use nalgebra::Point3;

/// A closed ball in cartesian space
#[derive(Clone, Debug, PartialEq)]
pub struct Sphere<T: GridScalar> {
    center: Point3<T>,
    radius: T,
}

impl<T: GridScalar> Sphere<T> {
    pub fn new(center: Point3<T>, radius: T) -> Self {
        Self { center, radius }
    }

    pub fn center(&self) -> &Point3<T> {
        &self.center
    }

    pub fn radius(&self) -> T {
        self.radius
    }

    /// Whether `point` lies inside or on the sphere
    pub fn contains(&self, point: &Point3<T>) -> bool {
        nalgebra::distance_squared(&self.center, point) <= self.radius * self.radius
    }

    /// The smallest sphere enclosing both `self` and `other`
    pub fn enclosing(&self, other: &Sphere<T>) -> Sphere<T> {
        let separation = other.center - self.center;
        let distance = separation.norm();
        if distance + other.radius <= self.radius {
            return self.clone();
        }
        if distance + self.radius <= other.radius {
            return other.clone();
        }
        let two = T::one() + T::one();
        let radius = (distance + self.radius + other.radius) / two;
        let center = self.center + separation * ((radius - self.radius) / distance);
        Sphere { center, radius }
    }

    /// Grows the radius by a relative amount, used to keep enclosing volumes conservative under
    /// rounding
    pub fn inflated(mut self, relative: T) -> Self {
        self.radius += self.radius * relative;
        self
    }
}
