//! Geographic coordinates (see [`GeoPoint2d`]) and conversion between the coordinate systems of
//! different map-views (see [`Transformer`]).

mod crs;
mod datum;
mod point;
mod projection;
mod transformer;

pub use crs::Crs;
pub use datum::Datum;
pub use point::GeoPoint2d;
pub use projection::{Projection, WebMercator};
pub use transformer::{BuiltinTransformer, Transformer};
