use crate::cartesian::CartesianPoint2d;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
///
/// Used both for map extents (in plot projection units) and for pixel regions of a canvas.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    /// Minimum x.
    pub x_min: f64,
    /// Minimum y.
    pub y_min: f64,
    /// Maximum x.
    pub x_max: f64,
    /// Maximum y.
    pub y_max: f64,
}

impl Rect {
    /// Creates a new rectangle.
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Minimum x.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Maximum x.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Minimum y.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Maximum y.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Smallest rectangle containing all the given points. Non-finite coordinates are skipped.
    ///
    /// Returns `None` if there are no finite points.
    pub fn from_points<'a, P: CartesianPoint2d + 'a>(
        points: impl IntoIterator<Item = &'a P>,
    ) -> Option<Self> {
        let mut result: Option<Rect> = None;
        for p in points {
            if !p.x().is_finite() || !p.y().is_finite() {
                continue;
            }

            let r = result.get_or_insert(Rect::new(p.x(), p.y(), p.x(), p.y()));
            r.x_min = r.x_min.min(p.x());
            r.y_min = r.y_min.min(p.y());
            r.x_max = r.x_max.max(p.x());
            r.y_max = r.y_max.max(p.y());
        }

        result
    }

    /// Smallest rectangle containing the finite values of the given coordinate slices.
    pub fn from_coordinates(x: &[f64], y: &[f64]) -> Option<Self> {
        let (x_min, x_max) = finite_range(x)?;
        let (y_min, y_max) = finite_range(y)?;
        Some(Self::new(x_min, y_min, x_max, y_max))
    }

    /// Returns true if the point lies inside the rectangle or on its border.
    pub fn contains(&self, point: &impl CartesianPoint2d) -> bool {
        self.x_min <= point.x()
            && self.x_max >= point.x()
            && self.y_min <= point.y()
            && self.y_max >= point.y()
    }

    /// Returns true if `other` lies completely inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }

    /// Returns true if the two rectangles share at least one point.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x_min <= other.x_max
            && self.x_max >= other.x_min
            && self.y_min <= other.y_max
            && self.y_max >= other.y_min
    }

    /// Smallest rectangle containing both rectangles.
    pub fn merge(&self, other: Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Grows the rectangle by `dx` to the left and right and by `dy` to the bottom and top.
    pub fn expand(&self, dx: f64, dy: f64) -> Self {
        Self {
            x_min: self.x_min - dx,
            x_max: self.x_max + dx,
            y_min: self.y_min - dy,
            y_max: self.y_max + dy,
        }
    }

    /// Scales the rectangle around its center.
    pub fn magnify(&self, factor: f64) -> Self {
        let cx = (self.x_min + self.x_max) / 2.0;
        let cy = (self.y_min + self.y_max) / 2.0;
        let half_width = self.width() / 2.0 * factor;
        let half_height = self.height() / 2.0 * factor;
        Self {
            x_min: cx - half_width,
            x_max: cx + half_width,
            y_min: cy - half_height,
            y_max: cy + half_height,
        }
    }
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
}
