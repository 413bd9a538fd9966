use eomaps_types::cartesian::{Point2d, Rect, Size};
use eomaps_types::geo::Crs;

/// Identifier of a map axes within a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AxesId(pub usize);

/// Visible part of one map axes: the extent in plot projection coordinates, the projection
/// itself and the size of the axes on the screen in pixels.
///
/// Screen coordinates have their origin in the top-left corner of the axes with `y` pointing
/// down; map coordinates have `y` pointing up.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    extent: Rect,
    crs: Crs,
    size: Size,
}

impl MapView {
    /// Creates a new view.
    pub fn new(extent: Rect, crs: Crs) -> Self {
        Self {
            extent,
            crs,
            size: Size::new(0.0, 0.0),
        }
    }

    /// Visible extent in plot projection units.
    pub fn extent(&self) -> Rect {
        self.extent
    }

    /// Projection of the view.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Size of the axes in pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Returns a copy of the view with the given extent.
    pub fn with_extent(&self, extent: Rect) -> Self {
        Self {
            extent,
            ..self.clone()
        }
    }

    /// Returns a copy of the view with the given screen size.
    pub fn with_size(&self, size: Size) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }

    /// Map units per pixel along the x and y axes.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.extent.width() / self.size.width(),
            self.extent.height() / self.size.height(),
        )
    }

    /// Converts a screen position into map coordinates.
    pub fn screen_to_map(&self, px_position: Point2d) -> Point2d {
        let (rx, ry) = self.resolution();
        Point2d::new(
            self.extent.x_min() + px_position.x * rx,
            self.extent.y_max() - px_position.y * ry,
        )
    }

    /// Converts a map position into screen coordinates.
    pub fn map_to_screen(&self, position: Point2d) -> Point2d {
        let (rx, ry) = self.resolution();
        Point2d::new(
            (position.x - self.extent.x_min()) / rx,
            (self.extent.y_max() - position.y) / ry,
        )
    }

    /// Moves the view so that the map point under `from` ends up under `to`.
    pub fn translate_by_pixels(&self, from: Point2d, to: Point2d) -> Self {
        let from = self.screen_to_map(from);
        let to = self.screen_to_map(to);
        let dx = to.x - from.x;
        let dy = to.y - from.y;

        self.with_extent(Rect::new(
            self.extent.x_min() - dx,
            self.extent.y_min() - dy,
            self.extent.x_max() - dx,
            self.extent.y_max() - dy,
        ))
    }

    /// Zooms the view by `zoom` around the screen point `base_point`. Values below 1 zoom in.
    pub fn zoom(&self, zoom: f64, base_point: Point2d) -> Self {
        let base = self.screen_to_map(base_point);
        let scale = |v: f64, b: f64| b + (v - b) * zoom;

        self.with_extent(Rect::new(
            scale(self.extent.x_min(), base.x),
            scale(self.extent.y_min(), base.y),
            scale(self.extent.x_max(), base.x),
            scale(self.extent.y_max(), base.y),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn view() -> MapView {
        MapView::new(Rect::new(-50.0, -50.0, 50.0, 50.0), Crs::WEB_MERCATOR)
            .with_size(Size::new(100.0, 100.0))
    }

    #[test]
    fn screen_to_map_size() {
        let view = view();

        assert_abs_diff_eq!(
            view.screen_to_map(Point2d::new(0.0, 0.0)),
            Point2d::new(-50.0, 50.0),
            epsilon = 0.0001,
        );
        assert_abs_diff_eq!(
            view.screen_to_map(Point2d::new(50.0, 50.0)),
            Point2d::new(0.0, 0.0),
            epsilon = 0.0001,
        );

        let view = MapView::new(Rect::new(-100.0, -25.0, 100.0, 25.0), Crs::WGS84)
            .with_size(Size::new(200.0, 50.0));

        assert_abs_diff_eq!(
            view.screen_to_map(Point2d::new(25.0, 49.0)),
            Point2d::new(-75.0, -24.0),
            epsilon = 0.0001,
        );
    }

    #[test]
    fn screen_to_map_zero_size() {
        let view = MapView::new(Rect::new(0.0, 0.0, 1.0, 1.0), Crs::WGS84);
        let projected = view.screen_to_map(Point2d::new(0.0, 0.0));
        assert!(projected.x.is_nan());
        assert!(projected.y.is_nan());
    }

    #[test]
    fn map_to_screen_inverts_screen_to_map() {
        let view = view();
        let px = Point2d::new(12.0, 77.0);
        assert_abs_diff_eq!(
            view.map_to_screen(view.screen_to_map(px)),
            px,
            epsilon = 0.0001
        );
    }

    #[test]
    fn translate_and_zoom() {
        let view = view();
        let moved = view.translate_by_pixels(Point2d::new(50.0, 50.0), Point2d::new(60.0, 50.0));
        assert_abs_diff_eq!(moved.extent().x_min(), -60.0, epsilon = 0.0001);
        assert_abs_diff_eq!(moved.extent().x_max(), 40.0, epsilon = 0.0001);

        let zoomed = view.zoom(0.5, Point2d::new(50.0, 50.0));
        assert_eq!(zoomed.extent(), Rect::new(-25.0, -25.0, 25.0, 25.0));
    }
}
