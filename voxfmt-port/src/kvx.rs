//! SLAB6 / Build engine `.kvx`: offset tables, then runs ("slabs") of palette indices
//! in each column, and a VGA palette in the last 768 bytes.
//!
//! Files may carry further mip levels after the first; those are not read.

use voxfmt::math::GridVector;
use voxfmt::stream::ByteReader;
use voxfmt::{Palette, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::slab6::{VGA_PALETTE_LEN, read_vga_palette};
use crate::util::volume_from_size;


const MAX_WIDTH: u32 = 256;
const MAX_HEIGHT: u32 = 255;
/// Offsets in the file are relative to the end of the header.
const HEADER_LEN: usize = 28;
const SLAB_HEADER_LEN: usize = 3;

#[derive(Debug)]
struct Header {
    /// File x, y, z; z points down.
    size: [u32; 3],
    /// Pivot in whole voxels, in file axes.
    pivot: [i32; 3],
    /// Start of each x column group, relative to [`HEADER_LEN`]; one more than the width.
    x_offsets: Vec<u32>,
    /// Start of each (x, y) column relative to its x group; one more than the length.
    xy_offsets: Vec<Vec<u16>>,
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header, FormatError> {
    let mip_len = r.read_u32_le()?;
    let size = [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?];
    log::debug!("kvx size {size:?}, first mip level {mip_len} bytes");
    let [sx, sy, sz] = size;
    FormatError::check_limit("kvx width", sx, MAX_WIDTH)?;
    FormatError::check_limit("kvx length", sy, MAX_WIDTH)?;
    FormatError::check_limit("kvx height", sz, MAX_HEIGHT)?;

    // stored with 8 fractional bits
    let pivot = [r.read_i32_le()? >> 8, r.read_i32_le()? >> 8, r.read_i32_le()? >> 8];

    let x_offsets = (0..=sx)
        .map(|_| r.read_u32_le())
        .collect::<Result<Vec<u32>, _>>()?;
    let xy_offsets = (0..sx)
        .map(|_| (0..=sy).map(|_| r.read_u16_le()).collect::<Result<Vec<u16>, _>>())
        .collect::<Result<Vec<_>, _>>()?;

    let tables_len = (sx + 1) * 4 + sx * (sy + 1) * 2;
    if x_offsets[0] != tables_len {
        return Err(FormatError::malformed(format!(
            "kvx data starts at {}, expected {tables_len}",
            x_offsets[0]
        )));
    }
    Ok(Header {
        size,
        pivot,
        x_offsets,
        xy_offsets,
    })
}

/// Reads the palette from the end of the file, which must lie after the offset tables.
fn read_palette(bytes: &[u8], tables_end: usize) -> Result<Palette, FormatError> {
    let r = &mut ByteReader::new(bytes);
    r.seek(tables_end)?;
    r.skip(VGA_PALETTE_LEN)?;
    r.seek(bytes.len() - VGA_PALETTE_LEN)?;
    read_vga_palette(r)
}

pub(crate) fn load_palette(bytes: &[u8]) -> Result<Palette, FormatError> {
    let r = &mut ByteReader::new(bytes);
    read_header(r)?;
    read_palette(bytes, r.pos())
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let header = read_header(r)?;
    let palette = read_palette(bytes, r.pos())?;
    let data_end = bytes.len() - VGA_PALETTE_LEN;

    let [sx, sy, sz] = header.size;
    let mut volume = volume_from_size("kvx size", [sx, sz, sy], MAX_WIDTH)?;
    for x in 0..sx as usize {
        let group_start = HEADER_LEN + header.x_offsets[x] as usize;
        for y in 0..sy as usize {
            let start = group_start + usize::from(header.xy_offsets[x][y]);
            let end = group_start + usize::from(header.xy_offsets[x][y + 1]);
            if end < start || end > data_end {
                return Err(FormatError::malformed(format!(
                    "kvx column {x},{y} spans bytes {start}..{end} outside the voxel data"
                )));
            }
            r.seek(start)?;
            while r.pos() + SLAB_HEADER_LEN <= end {
                let [top, len, _visibility] = r.read_array()?;
                for (i, &index) in r.read_bytes(usize::from(len))?.iter().enumerate() {
                    let z = u32::from(top) + i as u32;
                    if z >= sz {
                        return Err(FormatError::malformed(format!(
                            "kvx slab at {x},{y} reaches depth {z} of {sz}"
                        )));
                    }
                    let point = [x as i32, (sz - 1 - z) as i32, y as i32];
                    volume.set_voxel(point, Voxel::Generic(index));
                }
            }
            if r.pos() != end {
                return Err(FormatError::malformed(format!(
                    "kvx slabs at {x},{y} end at byte {}, expected {end}",
                    r.pos()
                )));
            }
        }
    }

    let [px, py, pz] = header.pivot;
    let pivot = GridVector::new(px, sz as i32 - 1 - pz, py);
    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("kvx", volume)
            .with_palette(palette)
            .with_transform(Transform {
                pivot,
                ..Transform::IDENTITY
            }),
    );
    Ok(graph)
}
