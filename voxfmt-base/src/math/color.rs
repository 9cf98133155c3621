//! Color data types. This module is private but reexported by its parent.

use core::fmt;

/// An 8-bit-per-component sRGB color with alpha.
///
/// This is the color representation stored in palettes and in truecolor voxel formats.
/// No color space conversion is ever performed on it; codecs copy the bytes through.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Rgba {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    /// Constructs a color from its components.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Constructs an opaque color.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Constructs a color from an array in `[r, g, b, a]` order.
    #[inline]
    pub const fn from_array([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the components in `[r, g, b, a]` order.
    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Unpacks a color stored as a little-endian `u32` whose lowest byte is red.
    #[inline]
    pub const fn from_u32_le(packed: u32) -> Self {
        Self::from_array(packed.to_le_bytes())
    }

    /// Packs this color into a `u32` whose lowest byte is red, as several formats store it.
    #[inline]
    pub const fn to_u32_le(self) -> u32 {
        u32::from_le_bytes(self.to_array())
    }

    /// Red component.
    #[inline]
    pub const fn r(self) -> u8 {
        self.r
    }
    /// Green component.
    #[inline]
    pub const fn g(self) -> u8 {
        self.g
    }
    /// Blue component.
    #[inline]
    pub const fn b(self) -> u8 {
        self.b
    }
    /// Alpha component; 0 is fully transparent.
    #[inline]
    pub const fn a(self) -> u8 {
        self.a
    }

    /// Returns this color with the alpha component replaced.
    #[inline]
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Whether the alpha component is zero.
    #[inline]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }

    /// Squared Euclidean distance between two colors, treating all four components
    /// as coordinates.
    #[inline]
    pub fn distance_squared(self, other: Rgba) -> u32 {
        self.to_array()
            .into_iter()
            .zip(other.to_array())
            .map(|(p, q)| {
                let d = u32::from(p.abs_diff(q));
                d * d
            })
            .sum()
    }
}

impl fmt::Debug for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rgba({self})")
    }
}

/// Formats as `#rrggbbaa`.
impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { r, g, b, a } = *self;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl From<[u8; 4]> for Rgba {
    #[inline]
    fn from(value: [u8; 4]) -> Self {
        Self::from_array(value)
    }
}

impl From<Rgba> for [u8; 4] {
    #[inline]
    fn from(value: Rgba) -> Self {
        value.to_array()
    }
}
