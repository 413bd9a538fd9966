use crate::cartesian::{NewCartesianPoint2d, Point2d};
use crate::geo::datum::Datum;
use crate::geo::point::GeoPoint2d;

/// Projection from one point type into another.
pub trait Projection {
    /// Input point type.
    type InPoint;
    /// Output point type.
    type OutPoint;

    /// Projects the point. Returns `None` if the point cannot be projected.
    fn project(&self, input: &Self::InPoint) -> Option<Self::OutPoint>;
    /// Inverse of [`Projection::project`].
    fn unproject(&self, input: &Self::OutPoint) -> Option<Self::InPoint>;
}

/// Spherical web mercator projection.
#[derive(Debug, Copy, Clone, Default)]
pub struct WebMercator {
    datum: Datum,
}

impl WebMercator {
    /// Creates a new projection for the given datum.
    pub fn new(datum: Datum) -> Self {
        Self { datum }
    }
}

impl Projection for WebMercator {
    type InPoint = GeoPoint2d;
    type OutPoint = Point2d;

    fn project(&self, input: &GeoPoint2d) -> Option<Point2d> {
        let x = self.datum.semimajor() * input.lon_rad();
        let y = self.datum.semimajor()
            * (std::f64::consts::FRAC_PI_4 + input.lat_rad() / 2.0)
                .tan()
                .ln();

        if x.is_finite() && y.is_finite() {
            Some(Point2d::new(x, y))
        } else {
            None
        }
    }

    fn unproject(&self, input: &Point2d) -> Option<GeoPoint2d> {
        let lat = std::f64::consts::FRAC_PI_2
            - 2.0 * (-input.y / self.datum.semimajor()).exp().atan();
        let lon = input.x / self.datum.semimajor();

        if lat.is_finite() && lon.is_finite() {
            Some(GeoPoint2d::latlon(lat.to_degrees(), lon.to_degrees()))
        } else {
            None
        }
    }
}
