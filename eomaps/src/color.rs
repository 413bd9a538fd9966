#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// RGBA color with straight (not premultiplied) alpha.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from_hex(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<Color> for String {
    fn from(val: Color) -> Self {
        val.to_hex()
    }
}

impl Color {
    /// `#00000000`, the initial content of cached backgrounds.
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// `#FF0000FF`
    pub const RED: Color = Color::rgba(255, 0, 0, 255);
    /// `#00FF00FF`
    pub const GREEN: Color = Color::rgba(0, 255, 0, 255);
    /// `#0000FFFF`
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);
    /// `#FFFFFFFF`
    pub const WHITE: Color = Color::gray(255);
    /// `#000000FF`
    pub const BLACK: Color = Color::gray(0);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Constructs color from an RGBA byte slice. Returns `None` if the slice is shorter than 4.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [r, g, b, a, ..] => Some(Self::rgba(*r, *g, *b, *a)),
            _ => None,
        }
    }

    /// Converts the color into u8 array (RGBA).
    pub fn to_u8_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Converts the color into HEX8 string: `#RRGGBBAA`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Parses `#RRGGBB` or `#RRGGBBAA`.
    pub fn try_from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 && digits.len() != 8 {
            return None;
        }

        let channel = |i: usize| u8::from_str_radix(digits.get(2 * i..2 * i + 2)?, 16).ok();
        let a = if digits.len() == 8 { channel(3)? } else { 255 };
        Some(Self::rgba(channel(0)?, channel(1)?, channel(2)?, a))
    }

    /// Opaque gray with all channels set to `value`.
    pub const fn gray(value: u8) -> Self {
        Self::rgba(value, value, value, 255)
    }

    /// Red channel.
    pub fn r(&self) -> u8 {
        self.r
    }

    /// Green channel.
    pub fn g(&self) -> u8 {
        self.g
    }

    /// Blue channel.
    pub fn b(&self) -> u8 {
        self.b
    }

    /// Alpha channel, straight.
    pub fn a(&self) -> u8 {
        self.a
    }

    /// Composites `fore` over `self` (source-over), scaling the alpha of `fore` by `opacity`.
    ///
    /// `opacity` is clamped to `[0, 1]`.
    pub fn over(&self, fore: Color, opacity: f64) -> Color {
        let opacity = opacity.clamp(0.0, 1.0);
        let src_a = fore.a as f64 / 255.0 * opacity;
        let dst_a = self.a as f64 / 255.0;

        let out_a = src_a + dst_a * (1.0 - src_a);
        if out_a <= 0.0 {
            return Color::TRANSPARENT;
        }

        let channel = |src: u8, dst: u8| {
            let value =
                (src as f64 * src_a + dst as f64 * dst_a * (1.0 - src_a)) / out_a;
            value.round().clamp(0.0, 255.0) as u8
        };

        Color {
            r: channel(fore.r, self.r),
            g: channel(fore.g, self.g),
            b: channel(fore.b, self.b),
            a: (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
        }
    }
}
