//! Qubicle Binary `.qb`: a header followed by a list of true-color matrices,
//! each optionally run-length encoded per Z slice.

use itertools::Itertools as _;

use voxfmt::math::{GridPoint, GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{PaletteLookup, RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::util::{check_save_size, truncated_name, volume_from_size, world_lower};
use crate::{FormatError, Handedness, SaveOptions};

#[cfg(test)]
mod tests;

/// Version 1.1.0.3, the only one Qubicle writes.
const VERSION: u32 = 131331;
/// Replaces a literal color: a count and a color follow.
const RLE_FLAG: u32 = 2;
/// Replaces a literal color: the current slice is finished.
const NEXT_SLICE_FLAG: u32 = 6;
const MAX_MATRICES: u32 = 16384;
const MAX_MATRIX_SIZE: u32 = 2048;
/// Runs longer than this are written with [`RLE_FLAG`].
const MIN_RLE_RUN: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ColorFormat {
    Rgba,
    Bgra,
}

#[derive(Clone, Copy, Debug)]
struct Header {
    color_format: ColorFormat,
    handedness: Handedness,
    compressed: bool,
    matrix_count: u32,
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header, FormatError> {
    let version = r.read_u32_le()?;
    if version != VERSION {
        log::warn!("unexpected qb version {version}, expected {VERSION}");
    }
    let color_format = match r.read_u32_le()? {
        0 => ColorFormat::Rgba,
        1 => ColorFormat::Bgra,
        other => return Err(FormatError::malformed(format!("unknown color format {other}"))),
    };
    let handedness = match r.read_u32_le()? {
        0 => Handedness::Left,
        1 => Handedness::Right,
        other => {
            return Err(FormatError::malformed(format!(
                "unknown z axis orientation {other}"
            )));
        }
    };
    let compressed = match r.read_u32_le()? {
        0 => false,
        1 => true,
        other => return Err(FormatError::malformed(format!("unknown compression {other}"))),
    };
    let visibility_mask = r.read_u32_le()?;
    let matrix_count = r.read_u32_le()?;
    FormatError::check_limit("matrix count", matrix_count, MAX_MATRICES)?;
    log::debug!(
        "qb header: version {version}, {color_format:?}, {handedness:?}, compressed {compressed}, \
        visibility mask {visibility_mask}, {matrix_count} matrices"
    );
    Ok(Header {
        color_format,
        handedness,
        compressed,
        matrix_count,
    })
}

/// Converts a position in file order (X fastest within a Z slice) to ours.
fn file_to_ours(handedness: Handedness, [x, y, z]: [u32; 3]) -> GridPoint {
    let [x, y, z] = [x as i32, y as i32, z as i32];
    match handedness {
        Handedness::Left => GridPoint::new(x, y, z),
        Handedness::Right => GridPoint::new(z, y, x),
    }
}

fn read_color(
    r: &mut ByteReader<'_>,
    format: ColorFormat,
    lookup: &mut PaletteLookup,
) -> Result<Voxel, FormatError> {
    let [c0, g, c2, alpha] = r.read_array()?;
    let (red, blue) = match format {
        ColorFormat::Rgba => (c0, c2),
        ColorFormat::Bgra => (c2, c0),
    };
    // Alpha is either opacity or a face visibility mask; zero means no voxel either way.
    if alpha == 0 {
        return Ok(Voxel::Air);
    }
    Ok(Voxel::Generic(lookup.get_or_add(Rgba::rgb(red, g, blue))))
}

struct Matrix {
    name: String,
    volume: RawVolume,
    offset: GridVector,
}

fn read_matrix(
    r: &mut ByteReader<'_>,
    header: &Header,
    lookup: &mut PaletteLookup,
) -> Result<Matrix, FormatError> {
    let name = r.read_pascal_string_u8()?;
    let file_size: [u32; 3] = [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?];
    let [o0, o1, o2] = [r.read_i32_le()?, r.read_i32_le()?, r.read_i32_le()?];
    log::debug!("qb matrix {name:?}: size {file_size:?}, offset {o0} {o1} {o2}");

    let [sx, sy, sz] = file_size;
    let (our_size, offset) = match header.handedness {
        Handedness::Left => ([sx, sy, sz], GridVector::new(o0, o1, o2)),
        Handedness::Right => ([sz, sy, sx], GridVector::new(o2, o1, o0)),
    };
    let mut volume = volume_from_size("qb matrix", our_size, MAX_MATRIX_SIZE)?;
    let mut set = |file_pos: [u32; 3], voxel: Voxel| {
        volume.set_voxel(file_to_ours(header.handedness, file_pos), voxel);
    };

    if !header.compressed {
        for z in 0..sz {
            for y in 0..sy {
                for x in 0..sx {
                    let voxel = read_color(r, header.color_format, lookup)?;
                    set([x, y, z], voxel);
                }
            }
        }
    } else {
        let slice_len = u64::from(sx) * u64::from(sy);
        let max_count = slice_len * u64::from(sz);
        for z in 0..sz {
            let mut index: u64 = 0;
            loop {
                let data = r.peek_u32_le()?;
                if data == NEXT_SLICE_FLAG {
                    r.skip(4)?;
                    break;
                }
                let mut count: u64 = 1;
                if data == RLE_FLAG {
                    r.skip(4)?;
                    count = u64::from(r.read_u32_le()?);
                    if count > max_count {
                        return Err(FormatError::malformed(format!(
                            "run of {count} voxels exceeds matrix size {file_size:?}"
                        )));
                    }
                }
                let voxel = read_color(r, header.color_format, lookup)?;
                // positions past the end of the slice are dropped
                for i in index..(index + count).min(slice_len) {
                    let x = (i % u64::from(sx)) as u32;
                    let y = (i / u64::from(sx)) as u32;
                    set([x, y, z], voxel);
                }
                index += count;
            }
        }
    }

    Ok(Matrix {
        name,
        volume,
        offset,
    })
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let header = read_header(r)?;
    let mut lookup = PaletteLookup::default();
    let matrices = (0..header.matrix_count)
        .map(|_| read_matrix(r, &header, &mut lookup))
        .collect::<Result<Vec<Matrix>, FormatError>>()?;

    // every matrix shares the palette as it was once all colors were seen
    let palette = lookup.into_palette();
    let mut graph = SceneGraph::new();
    for Matrix {
        name,
        volume,
        offset,
    } in matrices
    {
        graph.add_to_root(
            SceneNode::model(name, volume)
                .with_palette(palette.clone())
                .with_transform(Transform::from_translation(offset)),
        );
    }
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

pub(crate) fn save(graph: &SceneGraph, options: &SaveOptions) -> Result<Vec<u8>, FormatError> {
    let handedness = options.qb_handedness;
    let models: Vec<_> = graph.model_nodes().collect();
    let mut w = ByteWriter::new();
    w.write_u32_le(VERSION);
    w.write_u32_le(0); // RGBA
    w.write_u32_le(match handedness {
        Handedness::Left => 0,
        Handedness::Right => 1,
    });
    w.write_u32_le(1); // RLE
    w.write_u32_le(1); // alpha channel is visibility
    w.write_u32_le(models.len() as u32);

    for (id, node) in models {
        let Some(volume) = node.volume() else {
            continue;
        };
        let palette = graph.resolved_palette(id);
        let region = volume.region();
        check_save_size("qb matrix size", region, MAX_MATRIX_SIZE)?;

        w.write_pascal_string_u8(truncated_name(node.name(), 255))?;
        let size = region.size();
        let file_size = match handedness {
            Handedness::Left => [size.width, size.height, size.depth],
            Handedness::Right => [size.depth, size.height, size.width],
        };
        for s in file_size {
            w.write_u32_le(s);
        }
        let offset = world_lower(graph, id)?;
        let file_offset = match handedness {
            Handedness::Left => [offset.x, offset.y, offset.z],
            Handedness::Right => [offset.z, offset.y, offset.x],
        };
        for o in file_offset {
            w.write_i32_le(o);
        }

        let [sx, sy, sz] = file_size;
        let lower = region.lower().to_vector();
        for z in 0..sz {
            let slice = (0..sy).cartesian_product(0..sx).map(|(y, x)| {
                let point = file_to_ours(handedness, [x, y, z]) + lower;
                match volume.voxel(point) {
                    Voxel::Air => [0; 4],
                    Voxel::Generic(index) => {
                        let color = palette.color(index);
                        [color.r(), color.g(), color.b(), if color.a() > 0 { 255 } else { 0 }]
                    }
                }
            });
            for (count, color) in slice.dedup_with_count() {
                if count >= MIN_RLE_RUN {
                    w.write_u32_le(RLE_FLAG);
                    w.write_u32_le(count as u32);
                    w.write_bytes(&color);
                } else {
                    for _ in 0..count {
                        w.write_bytes(&color);
                    }
                }
            }
            w.write_u32_le(NEXT_SLICE_FLAG);
        }
    }
    Ok(w.into_inner())
}
