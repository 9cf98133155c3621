//! The in-memory representation shared by every voxel model codec in [`voxfmt-port`].
//!
//! * [`Voxel`]: one cell, either air or a palette index.
//! * [`RawVolume`]: a dense grid of voxels over a [`Region`](math::Region).
//! * [`Palette`] and [`PaletteLookup`]: up to 256 colors and nearest-color matching.
//! * [`SceneGraph`]: a tree of named nodes, each optionally owning a volume.
//! * [`stream`]: fallible cursors for reading and writing binary file contents.
//!
//! [`voxfmt-port`]: https://crates.io/crates/voxfmt-port/

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]

/// Grid coordinates, regions and colors.
pub mod math {
    pub use voxfmt_base::math::*;
}

mod palette;
pub use palette::*;
mod scene;
pub use scene::*;
pub mod stream;
mod voxel;
pub use voxel::*;
mod volume;
pub use volume::*;

#[doc(hidden)]
pub use voxfmt_base::euclid;
