//! Indexed color palettes and nearest-color matching.

use std::fmt;

use hashbrown::HashMap;
use itertools::Itertools as _;

use crate::math::Rgba;

/// Maximum number of entries in a [`Palette`]; indices are `u8`.
pub const MAX_COLORS: usize = 256;

/// An ordered list of at most [`MAX_COLORS`] colors, referred to by [`Voxel::Generic`]
/// indices.
///
/// Insertion order is index order. Index 0 is an ordinary color; codecs for file formats
/// which reserve an index for “empty” translate that to [`Voxel::Air`] themselves.
///
/// [`Voxel::Generic`]: crate::Voxel::Generic
/// [`Voxel::Air`]: crate::Voxel::Air
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct Palette {
    colors: Vec<Rgba>,
}

impl Palette {
    /// Constructs an empty palette.
    pub const fn new() -> Self {
        Self { colors: Vec::new() }
    }

    /// Constructs a palette containing exactly the given colors, in order.
    ///
    /// Duplicate colors are kept, since file formats refer to them by position.
    pub fn from_colors(colors: impl IntoIterator<Item = Rgba>) -> Result<Self, PaletteError> {
        let colors: Vec<Rgba> = colors.into_iter().collect();
        if colors.len() > MAX_COLORS {
            return Err(PaletteError::TooManyColors {
                count: colors.len(),
            });
        }
        Ok(Self { colors })
    }

    /// The built-in 256-color palette used when a file provides none:
    /// a 6×6×6 color cube followed by a 40-step gray ramp.
    pub fn builtin() -> Self {
        const LEVELS: [u8; 6] = [0, 51, 102, 153, 204, 255];
        let cube = LEVELS
            .into_iter()
            .cartesian_product(LEVELS)
            .cartesian_product(LEVELS)
            .map(|((r, g), b)| Rgba::rgb(r, g, b));
        let grays = (1..=40u32).map(|i| {
            let v = (i * 255 / 41) as u8;
            Rgba::rgb(v, v, v)
        });
        Self {
            colors: cube.chain(grays).collect(),
        }
    }

    /// Number of colors.
    #[inline]
    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// Whether the palette has no colors.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Whether no more colors can be added.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.colors.len() >= MAX_COLORS
    }

    /// Returns the color at `index`, or [`None`] if there is no such entry.
    #[inline]
    pub fn get(&self, index: u8) -> Option<Rgba> {
        self.colors.get(usize::from(index)).copied()
    }

    /// Returns the color at `index`, or [`Rgba::TRANSPARENT`] if there is no such entry.
    #[inline]
    pub fn color(&self, index: u8) -> Rgba {
        self.get(index).unwrap_or(Rgba::TRANSPARENT)
    }

    /// All colors, in index order.
    #[inline]
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Returns the first index whose color is exactly `color`.
    pub fn index_of(&self, color: Rgba) -> Option<u8> {
        self.colors
            .iter()
            .position(|&c| c == color)
            .map(|i| i as u8)
    }

    /// Returns the index of the color closest to `color` by squared Euclidean distance
    /// over the four components.
    ///
    /// Ties resolve to the lowest index, so the result is a pure function of the palette
    /// contents and `color`. Returns [`None`] if the palette is empty.
    pub fn nearest_index(&self, color: Rgba) -> Option<u8> {
        self.nearest_excluding(color, None)
    }

    fn nearest_excluding(&self, color: Rgba, excluded: Option<u8>) -> Option<u8> {
        self.colors
            .iter()
            .enumerate()
            .filter(|&(i, _)| Some(i) != excluded.map(usize::from))
            // min_by_key returns the first minimum, which gives the lowest-index tie-break
            .min_by_key(|&(_, &c)| c.distance_squared(color))
            .map(|(i, _)| i as u8)
    }

    /// Returns the index, other than `index` itself, whose color is closest to the color
    /// at `index`.
    ///
    /// Used by formats which reserve an index (usually 0) for empty space, to find where
    /// voxels using that index should go instead.
    pub fn find_replacement(&self, index: u8) -> Option<u8> {
        self.nearest_excluding(self.get(index)?, Some(index))
    }

    /// Adds `color` and returns its index.
    ///
    /// If `allow_duplicate` is false and the color is already present, returns the existing
    /// index without adding anything.
    ///
    /// Fails with [`PaletteError::Full`] if the palette already holds [`MAX_COLORS`] colors
    /// and a new entry would be needed; the palette is unchanged in that case.
    pub fn add_color(&mut self, color: Rgba, allow_duplicate: bool) -> Result<u8, PaletteError> {
        if !allow_duplicate && let Some(existing) = self.index_of(color) {
            return Ok(existing);
        }
        if self.is_full() {
            return Err(PaletteError::Full);
        }
        self.colors.push(color);
        Ok((self.colors.len() - 1) as u8)
    }
}

impl fmt::Debug for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Palette[{}]", self.colors.iter().format(", "))
    }
}

/// Errors from [`Palette`] construction and modification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum PaletteError {
    /// The palette already holds [`MAX_COLORS`] entries.
    #[error("palette is full ({MAX_COLORS} colors)")]
    Full,

    /// More than [`MAX_COLORS`] colors were supplied.
    #[error("{count} colors exceed the palette limit of {MAX_COLORS}")]
    TooManyColors {
        /// Number of colors supplied.
        count: usize,
    },
}

// -------------------------------------------------------------------------------------------------

/// Maps arbitrary colors to indices of a [`Palette`] that it builds up or matches against.
///
/// Used by codecs for formats which store a color per voxel. New colors are appended to the
/// palette while it has room; once full, colors map to their nearest existing entry.
/// Results are cached per distinct input color, since nearest-color search is linear in the
/// palette size and files repeat the same few colors many times.
#[derive(Clone, Debug, Default)]
pub struct PaletteLookup {
    palette: Palette,
    cache: HashMap<Rgba, u8>,
}

impl PaletteLookup {
    /// Starts from the given palette; existing entries are reused before new ones are added.
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            cache: HashMap::new(),
        }
    }

    /// The palette as built so far.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Finishes the lookup, returning the palette.
    pub fn into_palette(self) -> Palette {
        self.palette
    }

    /// Returns the index of the palette entry nearest to `color` without adding anything.
    pub fn find_closest_index(&self, color: Rgba) -> Option<u8> {
        match self.cache.get(&color) {
            Some(&index) => Some(index),
            None => self.palette.nearest_index(color),
        }
    }

    /// Returns the index for `color`: an exact match, a newly added entry, or, when the
    /// palette is full, the nearest entry.
    pub fn get_or_add(&mut self, color: Rgba) -> u8 {
        if let Some(&index) = self.cache.get(&color) {
            return index;
        }
        let index = match self.palette.add_color(color, false) {
            Ok(index) => index,
            // A full palette is never empty, so the nearest index exists.
            Err(_) => self.palette.nearest_index(color).unwrap_or(0),
        };
        self.cache.insert(color, index);
        index
    }
}
