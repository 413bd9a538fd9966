use std::sync::Arc;

use eomaps_types::cartesian::Rect;

use crate::color::Color;
use crate::error::EomapsError;

/// A copy of (a region of) the canvas drawing buffer.
///
/// Pixels are stored row by row in RGBA order with straight alpha. Clones share the pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    bytes: Arc<Vec<u8>>,
    dimensions: (u32, u32),
    bbox: Option<Rect>,
}

impl Raster {
    /// Creates a raster from raw RGBA bytes.
    pub fn new(bytes: Vec<u8>, width: u32, height: u32) -> Result<Self, EomapsError> {
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(EomapsError::Generic(format!(
                "raster of {width}x{height} pixels needs {expected} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self {
            bytes: Arc::new(bytes),
            dimensions: (width, height),
            bbox: None,
        })
    }

    /// Creates a raster filled with a single color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let bytes = color
            .to_u8_array()
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();

        Self {
            bytes: Arc::new(bytes),
            dimensions: (width, height),
            bbox: None,
        }
    }

    /// Creates a fully transparent raster.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::TRANSPARENT)
    }

    /// Sets the canvas region this raster was copied from.
    pub fn with_bbox(mut self, bbox: Option<Rect>) -> Self {
        self.bbox = bbox;
        self
    }

    /// Canvas region the raster was copied from. `None` means the whole canvas.
    pub fn bbox(&self) -> Option<Rect> {
        self.bbox
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Raw RGBA bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Color of the pixel at the given position.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width() || y >= self.height() {
            return None;
        }

        let offset = (y as usize * self.width() as usize + x as usize) * 4;
        Color::from_slice(self.bytes.get(offset..offset + 4)?)
    }

    /// Composites `top` over this raster, scaling its alpha by `opacity`.
    ///
    /// Only the overlapping part (anchored at the top-left corner) is composited.
    pub fn composite(&mut self, top: &Raster, opacity: f64) {
        let width = self.width().min(top.width()) as usize;
        let height = self.height().min(top.height()) as usize;
        let own_width = self.width() as usize;
        let top_width = top.width() as usize;
        let bytes = Arc::make_mut(&mut self.bytes);

        for row in 0..height {
            for col in 0..width {
                let dst = (row * own_width + col) * 4;
                let src = (row * top_width + col) * 4;
                let (Some(back), Some(fore)) = (
                    Color::from_slice(&bytes[dst..dst + 4]),
                    Color::from_slice(&top.bytes[src..src + 4]),
                ) else {
                    continue;
                };

                bytes[dst..dst + 4].copy_from_slice(&back.over(fore, opacity).to_u8_array());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn new_checks_size() {
        assert_matches!(Raster::new(vec![0; 15], 2, 2), Err(EomapsError::Generic(_)));
        let raster = Raster::new(vec![255; 16], 2, 2).expect("valid raster");
        assert_eq!(raster.pixel(1, 1), Some(Color::WHITE));
        assert_eq!(raster.pixel(2, 0), None);
    }

    #[test]
    fn composite_shares_nothing_with_clones() {
        let base = Raster::filled(2, 1, Color::RED);
        let mut composed = base.clone();
        composed.composite(&Raster::filled(2, 1, Color::BLUE), 1.0);

        assert_eq!(base.pixel(0, 0), Some(Color::RED));
        assert_eq!(composed.pixel(0, 0), Some(Color::BLUE));
    }
}
