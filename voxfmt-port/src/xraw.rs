//! MagicaVoxel XRaw (`.xraw`): a header, an uncompressed grid of palette indices or
//! colors, and the palette at the end.
//!
//! The file's y is our z, and its x runs opposite to ours.

use voxfmt::math::Rgba;
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{MergedVolume, Palette, PaletteLookup, SceneGraph, Voxel};

use crate::FormatError;
use crate::util::{check_save_size, merged_for_save, single_model_graph, volume_from_size};


const MAGIC: &str = "XRAW";
const HEADER_LEN: usize = 24;
const MAX_SIZE: u32 = 2048;
/// Unsigned integer channels; signed and floating point ones are not supported.
const CHANNEL_TYPE_UNSIGNED: u8 = 0;
const CHANNEL_COUNT_RGBA: u8 = 4;
const MAX_WIDE_PALETTE: u32 = 32768;
/// In 16-bit indices, both this and 0 mean empty.
const WIDE_EMPTY: u16 = u16::MAX;

/// How each voxel is stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Encoding {
    Rgba,
    Index8,
    Index16,
}

impl Encoding {
    fn voxel_len(self) -> usize {
        match self {
            Encoding::Rgba => 4,
            Encoding::Index8 => 1,
            Encoding::Index16 => 2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Header {
    encoding: Encoding,
    /// File x, y, z.
    size: [u32; 3],
    palette_len: u32,
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header, FormatError> {
    FormatError::check_magic(MAGIC, r.read_bytes(4)?)?;
    let [channel_type, channel_count, channel_bits, index_bits] = r.read_array()?;
    if channel_type != CHANNEL_TYPE_UNSIGNED {
        return Err(FormatError::Unsupported(format!(
            "xraw color channel type {channel_type}"
        )));
    }
    if channel_count != CHANNEL_COUNT_RGBA || channel_bits != 8 {
        return Err(FormatError::Unsupported(format!(
            "xraw colors of {channel_count} channels with {channel_bits} bits"
        )));
    }
    let size = [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?];
    let palette_len = r.read_u32_le()?;
    let encoding = match (index_bits, palette_len) {
        (0, _) | (_, 0) => Encoding::Rgba,
        (8, _) => Encoding::Index8,
        (16, _) => Encoding::Index16,
        (other, _) => {
            return Err(FormatError::malformed(format!("xraw index of {other} bits")));
        }
    };
    let max_palette = match encoding {
        Encoding::Index16 => MAX_WIDE_PALETTE,
        _ => voxfmt::MAX_COLORS as u32,
    };
    FormatError::check_limit("xraw palette size", palette_len, max_palette)?;
    log::debug!("xraw size {size:?}, {encoding:?}, {palette_len} palette entries");
    Ok(Header {
        encoding,
        size,
        palette_len,
    })
}

impl Header {
    /// Byte length of the voxel grid.
    fn body_len(&self) -> Result<usize, FormatError> {
        let [sx, sy, sz] = self.size.map(|s| s as usize);
        sx.checked_mul(sy)
            .and_then(|n| n.checked_mul(sz))
            .and_then(|n| n.checked_mul(self.encoding.voxel_len()))
            .ok_or_else(|| FormatError::malformed(format!("xraw size {:?}", self.size)))
    }
}

fn read_colors(r: &mut ByteReader<'_>, count: u32) -> Result<Vec<Rgba>, FormatError> {
    (0..count).map(|_| Ok(Rgba::from_array(r.read_array()?))).collect()
}

/// Reads the palette following the voxels of an indexed file.
fn read_palette_entries(bytes: &[u8], header: &Header) -> Result<Vec<Rgba>, FormatError> {
    let r = &mut ByteReader::new(bytes);
    r.seek(HEADER_LEN)?;
    r.skip(header.body_len()?)?;
    read_colors(r, header.palette_len)
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let header = read_header(r)?;
    let [sx, sy, sz] = header.size;
    // the whole grid must be present before anything is allocated for it
    r.peek_bytes(header.body_len()?)?;
    let mut volume = volume_from_size("xraw size", [sx, sz, sy], MAX_SIZE)?;

    let entries = match header.encoding {
        Encoding::Rgba => Vec::new(),
        _ => read_palette_entries(bytes, &header)?,
    };
    // 8-bit files keep their palette as is; other colors are collected.
    let mut lookup = match header.encoding {
        Encoding::Index8 => PaletteLookup::new(Palette::from_colors(entries.iter().copied())?),
        _ => PaletteLookup::default(),
    };
    let wide_entry = |index: u16| -> Result<Rgba, FormatError> {
        entries.get(usize::from(index)).copied().ok_or_else(|| {
            FormatError::malformed(format!(
                "xraw index {index} outside palette of {}",
                entries.len()
            ))
        })
    };

    for z in 0..sz as i32 {
        for y in 0..sy as i32 {
            for x in 0..sx as i32 {
                let voxel = match header.encoding {
                    Encoding::Rgba => {
                        let color = Rgba::from_array(r.read_array()?);
                        if color.is_transparent() {
                            Voxel::Air
                        } else {
                            Voxel::Generic(lookup.get_or_add(color))
                        }
                    }
                    Encoding::Index8 => match r.read_u8()? {
                        0 => Voxel::Air,
                        index if usize::from(index) < entries.len() => Voxel::Generic(index),
                        index => {
                            return Err(FormatError::malformed(format!(
                                "xraw index {index} outside palette of {}",
                                entries.len()
                            )));
                        }
                    },
                    Encoding::Index16 => match r.read_u16_le()? {
                        0 | WIDE_EMPTY => Voxel::Air,
                        index => Voxel::Generic(lookup.get_or_add(wide_entry(index)?)),
                    },
                };
                if voxel != Voxel::Air {
                    volume.set_voxel([sx as i32 - 1 - x, z, y], voxel);
                }
            }
        }
    }
    Ok(single_model_graph("xraw", volume, lookup.into_palette()))
}

// -------------------------------------------------------------------------------------------------

/// Saves 8-bit indices. Index 0 means empty, so a color there moves to a free
/// entry, or failing that to its nearest neighbor.
pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let MergedVolume {
        volume,
        mut palette,
    } = merged_for_save(graph)?;
    let region = volume.region();
    check_save_size("xraw size", region, MAX_SIZE)?;

    let first = palette.color(0);
    let replacement = match palette.add_color(first, true) {
        Ok(index) => index,
        Err(_) => palette.find_replacement(0).unwrap_or(1),
    };

    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    w.write_bytes(&[CHANNEL_TYPE_UNSIGNED, CHANNEL_COUNT_RGBA, 8, 8]);
    w.write_u32_le(region.width());
    w.write_u32_le(region.depth());
    w.write_u32_le(region.height());
    w.write_u32_le(voxfmt::MAX_COLORS as u32);

    let lower = region.lower();
    let upper = region.upper();
    for y in lower.y..=upper.y {
        for z in lower.z..=upper.z {
            for x in (lower.x..=upper.x).rev() {
                w.write_u8(match volume.voxel([x, y, z]) {
                    Voxel::Air => 0,
                    Voxel::Generic(0) => replacement,
                    Voxel::Generic(index) => index,
                });
            }
        }
    }

    w.write_bytes(&Rgba::TRANSPARENT.to_array());
    for index in 1..=u8::MAX {
        w.write_bytes(&palette.get(index).unwrap_or(Rgba::TRANSPARENT).to_array());
    }
    Ok(w.into_inner())
}
