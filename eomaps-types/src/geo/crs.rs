use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coordinate reference system of a map-view.
///
/// The crate only knows how to convert between [`Crs::WGS84`] and [`Crs::WEB_MERCATOR`]
/// itself. Everything else is identified by its EPSG code or name and has to be handled by a
/// custom [`Transformer`](super::Transformer).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Crs {
    /// Coordinate system identified by its EPSG code.
    Epsg(u32),
    /// Any other named coordinate system (e.g. a proj string).
    Named(String),
}

impl Crs {
    /// Geographic latitude/longitude coordinates on the WGS84 ellipsoid (x = lon, y = lat).
    pub const WGS84: Crs = Crs::Epsg(4326);
    /// Web Mercator projection.
    pub const WEB_MERCATOR: Crs = Crs::Epsg(3857);
}

impl Display for Crs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Named(name) => write!(f, "{name}"),
        }
    }
}

impl From<u32> for Crs {
    fn from(code: u32) -> Self {
        Crs::Epsg(code)
    }
}
