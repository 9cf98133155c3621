/// Contents of one cell of a [`RawVolume`](crate::RawVolume).
///
/// A voxel does not carry a color of its own; a [`Generic`](Voxel::Generic) voxel refers
/// to an entry of the palette that applies to its volume. Emptiness is expressed only by
/// [`Voxel::Air`], never by a particular palette index.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[allow(clippy::exhaustive_enums)]
pub enum Voxel {
    /// Empty space.
    #[default]
    Air,
    /// A solid voxel whose color is the given palette index.
    Generic(u8),
}

impl Voxel {
    /// Whether this is [`Voxel::Air`].
    #[inline]
    pub const fn is_air(self) -> bool {
        matches!(self, Voxel::Air)
    }

    /// Returns the palette index of a solid voxel.
    #[inline]
    pub const fn color_index(self) -> Option<u8> {
        match self {
            Voxel::Air => None,
            Voxel::Generic(index) => Some(index),
        }
    }
}

impl From<u8> for Voxel {
    #[inline]
    fn from(index: u8) -> Self {
        Voxel::Generic(index)
    }
}
