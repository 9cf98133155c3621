//! Reading and writing voxel model files as [`voxfmt::SceneGraph`]s.
//!
//! Currently supported formats:
//!
//! | Format                   | Extension | Load    | Save    | Caveats |
//! |--------------------------|-----------|:-------:|:-------:|---------|
//! | MagicaVoxel              | `.vox`    | **Yes** | **Yes** | Needs the `"dot-vox"` feature. Node translations are not saved. |
//! | Qubicle Binary Tree      | `.qbt`    | **Yes** | **Yes** | |
//! | Qubicle Binary           | `.qb`     | **Yes** | **Yes** | Colors are quantized to 256 entries. |
//! | Qubicle Project          | `.qbcl`   | **Yes** | **Yes** | Thumbnails are not written. |
//! | Sandbox VoxEdit model    | `.vxm`    | **Yes** | **Yes** | Saves version 5 only. |
//! | Sandbox VoxEdit rig      | `.vxr`    | **Yes** | **Yes** | Models live in `.vxm` files beside it; see [`Format::Vxr`]. |
//! | BinVox                   | `.binvox` | **Yes** | **Yes** | Only solid/empty: colors are lost. |
//! | Cubeworld                | `.cub`    | **Yes** | **Yes** | |
//! | SLAB6 KVX                | `.kvx`    | **Yes** | No      | Mip levels after the first are ignored. |
//! | SLAB6 KV6                | `.kv6`    | **Yes** | **Yes** | |
//! | Command & Conquer VXL    | `.vxl`    | **Yes** | **Yes** | Normals are not preserved. |
//! | Ace of Spades VXL        | `.vxl`    | **Yes** | **Yes** | Map size is fixed at 512×512. |
//! | Qubicle Exchange         | `.qef`    | **Yes** | **Yes** | |
//! | Goxel                    | `.gox`    | **Yes** | **Yes** | Needs the `"gox"` feature. Materials beyond color are ignored. |
//! | MagicaVoxel XRaw         | `.xraw`   | **Yes** | **Yes** | |
//! | Minecraft region         | `.mca`    | **Yes** | No      | |
//!
//! Loading or saving by file name ([`load_volume_format()`], [`save_volume_format()`])
//! recognizes only the extensions in [`LOAD_EXTENSIONS`] and [`SAVE_EXTENSIONS`];
//! the other formats are reachable by naming a [`Format`] explicitly.
//!
//! ## Package features
//!
//! * `"dot-vox"`: MagicaVoxel `.vox` support, via the [`dot_vox`] library.
//! * `"gox"`: Goxel support, via the [`image`] library for its PNG-encoded blocks.
//! * `"all-formats"`: all of the above; enabled by default.

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]

use std::fmt;
use std::io;
use std::str::FromStr;

use voxfmt::{Palette, SceneGraph};

// -------------------------------------------------------------------------------------------------

mod error;
pub use error::*;
mod export;
pub use export::*;
pub mod file;
mod import;
pub use import::*;
mod options;
pub use options::*;
mod util;

// Formats
mod aos_vxl;
mod binvox;
mod cnc_vxl;
mod cub;
#[cfg(feature = "gox")]
mod gox;
mod kv6;
mod kvx;
mod mcr;
#[cfg(feature = "dot-vox")]
mod mv;
mod qb;
mod qbcl;
mod qbt;
mod qef;
mod slab6;
mod vxm;
mod vxr;
mod xraw;

#[cfg(test)]
mod tests;

// -------------------------------------------------------------------------------------------------

/// File formats that voxel models can be loaded from or saved to.
///
/// Note that if some feature flags are disabled, this library may not be in fact able to
/// handle all of these formats. The enum variants are present un-conditionally
/// so that the formats can be described regardless.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Format {
    /// [MagicaVoxel `.vox`][vox] file.
    ///
    /// [vox]: https://github.com/ephtracy/voxel-model/blob/master/MagicaVoxel-file-format-vox.txt
    Vox,

    /// Qubicle Binary Tree (`.qbt`): a node tree of zlib-compressed matrices.
    Qbt,

    /// Qubicle Binary (`.qb`): a list of run-length encoded true-color matrices.
    Qb,

    /// Qubicle project (`.qbcl`), with per-column zlib-compressed run-length data.
    Qbcl,

    /// Sandbox VoxEdit model (`.vxm`), versions 4 to 12.
    Vxm,

    /// Sandbox VoxEdit rig (`.vxr`), versions 1 to 9: a node hierarchy whose models are
    /// separate [`Format::Vxm`] files in the same directory.
    ///
    /// Those files are only reached when loading through a [`Fileish`](file::Fileish) or
    /// saving to a path: [`Format::load()`] leaves group nodes where the models would be,
    /// and [`Format::save()`] fails. Node translations and animations are not saved.
    Vxr,

    /// [BinVox](https://www.patrickmin.com/binvox/binvox.html) solid/empty grid.
    BinVox,

    /// Cubeworld `.cub`: dimensions followed by one RGB triple per voxel.
    Cub,

    /// SLAB6 / Build engine `.kvx`: column slabs and a 6-bit VGA palette.
    Kvx,

    /// SLAB6 `.kv6`: surface voxel list with per-voxel colors.
    Kv6,

    /// Command & Conquer: Tiberian Sun / Red Alert 2 `.vxl`.
    CncVxl,

    /// Ace of Spades map `.vxl`: 512×512 column spans.
    AosVxl,

    /// Qubicle Exchange (`.qef`) text format.
    Qef,

    /// [Goxel](https://goxel.xyz/) `.gox`: PNG-encoded 16³ blocks and layers.
    Gox,

    /// MagicaVoxel XRaw (`.xraw`): uncompressed indexed or true-color grid.
    XRaw,

    /// Minecraft region file (`.mca`/`.mcr`) containing NBT chunks.
    Mcr,
}

/// Extensions recognized by [`load_volume_format()`], in lookup order.
///
/// `vxl` is ambiguous; it is tried as [`Format::CncVxl`] and then as [`Format::AosVxl`].
pub const LOAD_EXTENSIONS: &[&str] = &[
    "vox", "qbt", "qb", "vxm", "binvox", "cub", "kvx", "kv6", "vxl", "qef",
];

/// Extensions recognized by [`save_volume_format()`]. Any other extension saves
/// as [`Format::Qb`].
pub const SAVE_EXTENSIONS: &[&str] = &["vox", "qbt", "qb", "binvox", "cub", "vxl", "qef"];

impl Format {
    /// Every format, in the order of the table in the crate documentation.
    pub const ALL: [Format; 16] = [
        Format::Vox,
        Format::Qbt,
        Format::Qb,
        Format::Qbcl,
        Format::Vxm,
        Format::Vxr,
        Format::BinVox,
        Format::Cub,
        Format::Kvx,
        Format::Kv6,
        Format::CncVxl,
        Format::AosVxl,
        Format::Qef,
        Format::Gox,
        Format::XRaw,
        Format::Mcr,
    ];

    /// Return a noun phrase naming the format, e.g. “Qubicle Binary Tree”.
    pub fn descriptive_name(self) -> impl fmt::Display {
        match self {
            Format::Vox => "MagicaVoxel .vox",
            Format::Qbt => "Qubicle Binary Tree",
            Format::Qb => "Qubicle Binary",
            Format::Qbcl => "Qubicle project",
            Format::Vxm => "Sandbox VoxEdit model",
            Format::Vxr => "Sandbox VoxEdit rig",
            Format::BinVox => "BinVox",
            Format::Cub => "Cubeworld .cub",
            Format::Kvx => "SLAB6 KVX",
            Format::Kv6 => "SLAB6 KV6",
            Format::CncVxl => "Command & Conquer VXL",
            Format::AosVxl => "Ace of Spades VXL",
            Format::Qef => "Qubicle Exchange",
            Format::Gox => "Goxel",
            Format::XRaw => "MagicaVoxel XRaw",
            Format::Mcr => "Minecraft region",
        }
    }

    /// Short identifier accepted by [`Format::from_str()`], e.g. `"cnc-vxl"`.
    pub fn id(self) -> &'static str {
        match self {
            Format::Vox => "vox",
            Format::Qbt => "qbt",
            Format::Qb => "qb",
            Format::Qbcl => "qbcl",
            Format::Vxm => "vxm",
            Format::Vxr => "vxr",
            Format::BinVox => "binvox",
            Format::Cub => "cub",
            Format::Kvx => "kvx",
            Format::Kv6 => "kv6",
            Format::CncVxl => "cnc-vxl",
            Format::AosVxl => "aos-vxl",
            Format::Qef => "qef",
            Format::Gox => "gox",
            Format::XRaw => "xraw",
            Format::Mcr => "mcr",
        }
    }

    /// File name extensions conventionally used for this format, without the dot.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Vox => &["vox"],
            Format::Qbt => &["qbt"],
            Format::Qb => &["qb"],
            Format::Qbcl => &["qbcl"],
            Format::Vxm => &["vxm"],
            Format::Vxr => &["vxr"],
            Format::BinVox => &["binvox"],
            Format::Cub => &["cub"],
            Format::Kvx => &["kvx"],
            Format::Kv6 => &["kv6"],
            Format::CncVxl | Format::AosVxl => &["vxl"],
            Format::Qef => &["qef"],
            Format::Gox => &["gox"],
            Format::XRaw => &["xraw"],
            Format::Mcr => &["mca", "mcr"],
        }
    }

    /// Whether this library can load the format, given the enabled package features.
    pub fn can_load(self) -> bool {
        match self {
            Format::Vox => cfg!(feature = "dot-vox"),
            Format::Gox => cfg!(feature = "gox"),
            _ => true,
        }
    }

    /// Whether this library can save the format, given the enabled package features.
    pub fn can_save(self) -> bool {
        match self {
            Format::Vox => cfg!(feature = "dot-vox"),
            Format::Gox => cfg!(feature = "gox"),
            Format::Kvx | Format::Mcr => false,
            _ => true,
        }
    }

    /// Returns the format [`load_volume_format()`] tries first for a file with the
    /// extension `extension` (without the dot, in any letter case).
    ///
    /// Only the extensions in [`LOAD_EXTENSIONS`] are recognized.
    pub fn from_extension(extension: &str) -> Option<Format> {
        let extension = extension.to_ascii_lowercase();
        if !LOAD_EXTENSIONS.contains(&extension.as_str()) {
            return None;
        }
        Format::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&extension.as_str()))
    }

    /// Returns the format [`save_volume_format()`] uses for a file with the extension
    /// `extension`, or [`None`] if it is not one of [`SAVE_EXTENSIONS`].
    pub fn for_save_extension(extension: &str) -> Option<Format> {
        let extension = extension.to_ascii_lowercase();
        if !SAVE_EXTENSIONS.contains(&extension.as_str()) {
            return None;
        }
        Format::from_extension(&extension)
    }

    /// Format tried after `self` fails to load a file with an ambiguous extension.
    pub(crate) fn load_fallback(self) -> Option<Format> {
        match self {
            Format::CncVxl => Some(Format::AosVxl),
            _ => None,
        }
    }

    /// Decodes `bytes` as this format.
    pub fn load(self, bytes: &[u8], options: &LoadOptions) -> Result<SceneGraph, FormatError> {
        let graph = match self {
            Format::Vox => {
                cfg_if::cfg_if! {
                    if #[cfg(feature = "dot-vox")] {
                        mv::load(bytes)?
                    } else {
                        return Err(FormatError::Disabled { format: self });
                    }
                }
            }
            Format::Qbt => qbt::load(bytes, options)?,
            Format::Qb => qb::load(bytes)?,
            Format::Qbcl => qbcl::load(bytes, options)?,
            Format::Vxm => vxm::load(bytes)?,
            Format::Vxr => vxr::load(bytes, |file_name: &str| {
                Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{file_name:?} is a separate file"),
                ))
            })?,
            Format::BinVox => binvox::load(bytes)?,
            Format::Cub => cub::load(bytes)?,
            Format::Kvx => kvx::load(bytes)?,
            Format::Kv6 => kv6::load(bytes)?,
            Format::CncVxl => cnc_vxl::load(bytes)?,
            Format::AosVxl => aos_vxl::load(bytes)?,
            Format::Qef => qef::load(bytes)?,
            Format::Gox => {
                cfg_if::cfg_if! {
                    if #[cfg(feature = "gox")] {
                        gox::load(bytes)?
                    } else {
                        return Err(FormatError::Disabled { format: self });
                    }
                }
            }
            Format::XRaw => xraw::load(bytes)?,
            Format::Mcr => mcr::load(bytes)?,
        };
        log::info!(
            "Loaded {format}: {models} models",
            format = self.descriptive_name(),
            models = graph.model_count()
        );
        Ok(graph)
    }

    /// Reads only the colors of a file in this format.
    ///
    /// Formats with an explicit palette section read just that; the others decode the
    /// whole file and return the palette of the first model.
    pub fn load_palette(self, bytes: &[u8]) -> Result<Palette, FormatError> {
        match self {
            Format::Qbt => qbt::load_palette(bytes),
            Format::Vxm => vxm::load_palette(bytes),
            Format::Kvx => kvx::load_palette(bytes),
            Format::CncVxl => cnc_vxl::load_palette(bytes),
            Format::Qef => qef::load_palette(bytes),
            _ => {
                let graph = self.load(bytes, &LoadOptions::default())?;
                let (id, _) = graph.model_nodes().next().ok_or(FormatError::EmptyScene)?;
                Ok(graph.resolved_palette(id))
            }
        }
    }

    /// Encodes `graph` as this format.
    ///
    /// Fails with [`FormatError::EmptyScene`] if the graph has no model nodes, and with
    /// [`FormatError::Unsupported`] for [`Format::Vxr`], which [`save_volume_as()`] writes.
    pub fn save(self, graph: &SceneGraph, options: &SaveOptions) -> Result<Vec<u8>, FormatError> {
        if graph.is_empty() {
            return Err(FormatError::EmptyScene);
        }
        let bytes = match self {
            Format::Vox => {
                cfg_if::cfg_if! {
                    if #[cfg(feature = "dot-vox")] {
                        mv::save(graph)?
                    } else {
                        return Err(FormatError::Disabled { format: self });
                    }
                }
            }
            Format::Qbt => qbt::save(graph)?,
            Format::Qb => qb::save(graph, options)?,
            Format::Qbcl => qbcl::save(graph)?,
            Format::Vxm => vxm::save(graph)?,
            Format::Vxr => {
                return Err(FormatError::Unsupported(format!(
                    "{} refers to separate model files and must be saved to a path",
                    self.descriptive_name()
                )));
            }
            Format::BinVox => binvox::save(graph)?,
            Format::Cub => cub::save(graph)?,
            Format::Kv6 => kv6::save(graph)?,
            Format::CncVxl => cnc_vxl::save(graph)?,
            Format::AosVxl => aos_vxl::save(graph)?,
            Format::Qef => qef::save(graph)?,
            Format::Gox => {
                cfg_if::cfg_if! {
                    if #[cfg(feature = "gox")] {
                        gox::save(graph)?
                    } else {
                        return Err(FormatError::Disabled { format: self });
                    }
                }
            }
            Format::XRaw => xraw::save(graph)?,
            Format::Kvx | Format::Mcr => {
                return Err(FormatError::Unsupported(format!(
                    "saving {} is not implemented",
                    self.descriptive_name()
                )));
            }
        };
        log::info!(
            "Saved {format}: {len} bytes",
            format = self.descriptive_name(),
            len = bytes.len()
        );
        Ok(bytes)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Format {
    type Err = UnknownFormatName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFormatName(s.to_owned()))
    }
}

/// Error from parsing a [`Format`] identifier.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown format name {0:?}")]
pub struct UnknownFormatName(String);
