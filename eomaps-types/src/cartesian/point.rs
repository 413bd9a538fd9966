use nalgebra::{Point2, Vector2};

/// Point in a 2d cartesian space with `f64` coordinates.
pub type Point2d = Point2<f64>;

/// A point with `x` and `y` coordinates in a cartesian coordinate system.
pub trait CartesianPoint2d {
    /// X coordinate.
    fn x(&self) -> f64;
    /// Y coordinate.
    fn y(&self) -> f64;

    /// Vector from `other` to `self`.
    fn sub(&self, other: &impl CartesianPoint2d) -> Vector2<f64> {
        Vector2::new(self.x() - other.x(), self.y() - other.y())
    }

    /// Squared euclidean distance between the points.
    fn distance_sq(&self, other: &impl CartesianPoint2d) -> f64 {
        let v = self.sub(other);
        v.x * v.x + v.y * v.y
    }

    /// Euclidean distance between the points.
    fn distance(&self, other: &impl CartesianPoint2d) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Sum of the absolute coordinate differences.
    fn taxicab_distance(&self, other: &impl CartesianPoint2d) -> f64 {
        (self.x() - other.x()).abs() + (self.y() - other.y()).abs()
    }
}

/// Cartesian point that can be constructed from its coordinates.
pub trait NewCartesianPoint2d: CartesianPoint2d {
    /// Creates a new point.
    fn new(x: f64, y: f64) -> Self;
}

impl CartesianPoint2d for Point2d {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

impl NewCartesianPoint2d for Point2d {
    fn new(x: f64, y: f64) -> Self {
        Point2::new(x, y)
    }
}

impl CartesianPoint2d for (f64, f64) {
    fn x(&self) -> f64 {
        self.0
    }

    fn y(&self) -> f64 {
        self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distances() {
        let a = Point2d::new(0.0, 0.0);
        let b = Point2d::new(3.0, 4.0);

        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(a.distance_sq(&b), 25.0);
        assert_relative_eq!(a.taxicab_distance(&(3.0, -4.0)), 7.0);
    }
}
