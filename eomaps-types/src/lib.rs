//! Geometry primitives used by `eomaps`: cartesian points and rectangles in plot coordinates,
//! geographic points, coordinate reference systems and transformations between them.

pub mod cartesian;
pub mod error;
pub mod geo;

pub use cartesian::{CartesianPoint2d, Point2d, Rect, Size};
pub use geo::{Crs, Transformer};
