//! Types and functions on geometries in cartesian (plot projection) coordinates.

mod point;
mod rect;
mod size;

pub use point::{CartesianPoint2d, NewCartesianPoint2d, Point2d};
pub use rect::Rect;
pub use size::Size;
