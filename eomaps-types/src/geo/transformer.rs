use crate::cartesian::Point2d;
use crate::error::EomapsTypesError;
use crate::geo::crs::Crs;
use crate::geo::point::GeoPoint2d;
use crate::geo::projection::{Projection, WebMercator};

/// Transforms points between coordinate systems.
///
/// Used to re-project event positions when events are forwarded from one map-view to another.
/// Implement this for a full projection engine; [`BuiltinTransformer`] only knows about
/// [`Crs::WGS84`] and [`Crs::WEB_MERCATOR`].
pub trait Transformer {
    /// Transforms `point` given in `from` coordinates into `to` coordinates.
    fn transform(&self, from: &Crs, to: &Crs, point: Point2d)
        -> Result<Point2d, EomapsTypesError>;
}

/// Transformer supporting identity transforms and conversions between WGS84 and web mercator.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTransformer {
    mercator: WebMercator,
}

impl Transformer for BuiltinTransformer {
    fn transform(
        &self,
        from: &Crs,
        to: &Crs,
        point: Point2d,
    ) -> Result<Point2d, EomapsTypesError> {
        if from == to {
            return Ok(point);
        }

        let unknown = || EomapsTypesError::UnknownCrs {
            from: from.to_string(),
            to: to.to_string(),
        };

        if *from == Crs::WGS84 && *to == Crs::WEB_MERCATOR {
            self.mercator
                .project(&GeoPoint2d::latlon(point.y, point.x))
                .ok_or_else(|| EomapsTypesError::Conversion(format!("{point:?} out of range")))
        } else if *from == Crs::WEB_MERCATOR && *to == Crs::WGS84 {
            self.mercator
                .unproject(&point)
                .map(|p| Point2d::new(p.lon(), p.lat()))
                .ok_or_else(|| EomapsTypesError::Conversion(format!("{point:?} out of range")))
        } else {
            Err(unknown())
        }
    }
}

impl<T: Transformer + ?Sized> Transformer for Box<T> {
    fn transform(
        &self,
        from: &Crs,
        to: &Crs,
        point: Point2d,
    ) -> Result<Point2d, EomapsTypesError> {
        (**self).transform(from, to, point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_and_mercator() {
        let transformer = BuiltinTransformer::default();
        let p = Point2d::new(10.0, 20.0);

        assert_eq!(
            transformer
                .transform(&Crs::Epsg(32633), &Crs::Epsg(32633), p)
                .expect("identity failed"),
            p
        );

        let projected = transformer
            .transform(&Crs::WGS84, &Crs::WEB_MERCATOR, p)
            .expect("projection failed");
        let back = transformer
            .transform(&Crs::WEB_MERCATOR, &Crs::WGS84, projected)
            .expect("unprojection failed");
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn unknown_crs() {
        let transformer = BuiltinTransformer::default();
        let result = transformer.transform(&Crs::WGS84, &Crs::Epsg(32633), Point2d::origin());
        assert!(matches!(result, Err(EomapsTypesError::UnknownCrs { .. })));
    }
}
