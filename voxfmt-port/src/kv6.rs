//! SLAB6 `.kv6`: a list of surface voxels with their own colors, grouped into columns
//! by count tables, optionally followed by a suggested palette.
//!
//! Only surface voxels are stored, so solid interiors come back hollow.

use voxfmt::math::{GridPoint, GridVector, Rgba, checked_add_vectors};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{MergedVolume, PaletteLookup, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::slab6::{face_visibility, read_vga_palette, write_vga_palette};
use crate::util::{merged_for_save, volume_from_size};

#[cfg(test)]
mod tests;

const MAGIC: &str = "Kvxl";
const PALETTE_MAGIC: &[u8; 4] = b"SPal";
const MAX_WIDTH: u32 = 256;
const MAX_HEIGHT: u32 = 255;
const MAX_VOXELS: u32 = 1 << 20;
const HEADER_LEN: usize = 32;
const RECORD_LEN: usize = 8;
/// Written by SLAB6 into the byte after each color.
const SLAB6_MARKER: u8 = 128;
/// Lighting direction meaning "none".
const NO_DIRECTION: u8 = 255;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Record {
    color: Rgba,
    /// Depth from the top of the model.
    z: u8,
    visibility: u8,
}

fn read_record(r: &mut ByteReader<'_>) -> Result<Record, FormatError> {
    let [blue, green, red, _marker, z, _, visibility, _direction] = r.read_array()?;
    Ok(Record {
        color: Rgba::rgb(red, green, blue),
        z,
        visibility,
    })
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    FormatError::check_magic(MAGIC, r.read_bytes(4)?)?;
    let [width, length, height] = [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?];
    FormatError::check_limit("kv6 width", width, MAX_WIDTH)?;
    FormatError::check_limit("kv6 length", length, MAX_WIDTH)?;
    FormatError::check_limit("kv6 height", height, MAX_HEIGHT)?;
    let pivot = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
    let count = r.read_u32_le()?;
    FormatError::check_limit("kv6 voxel count", count, MAX_VOXELS)?;
    let mut volume = volume_from_size("kv6 size", [width, height, length], MAX_WIDTH)?;

    // Files from SLAB5 end after the tables; SLAB6 appends a palette.
    let palette_start = HEADER_LEN
        + count as usize * RECORD_LEN
        + width as usize * 4
        + (width * length) as usize * 2;
    let suggested = match bytes.get(palette_start..palette_start + PALETTE_MAGIC.len()) {
        Some(magic) if magic == PALETTE_MAGIC => {
            let pr = &mut ByteReader::new(bytes);
            pr.seek(palette_start + PALETTE_MAGIC.len())?;
            Some(read_vga_palette(pr)?)
        }
        _ => None,
    };
    log::debug!(
        "kv6 {width}x{length}x{height}, {count} voxels, suggested palette: {}",
        suggested.is_some()
    );

    let records = (0..count)
        .map(|_| read_record(r))
        .collect::<Result<Vec<Record>, FormatError>>()?;
    // per-x totals duplicate the per-column counts
    r.skip(width as usize * 4)?;
    let mut lookup = suggested.map(PaletteLookup::new).unwrap_or_default();
    let mut records = records.into_iter();
    for x in 0..width as i32 {
        for y in 0..length as i32 {
            let column_len = r.read_u16_le()?;
            for _ in 0..column_len {
                let record = records.next().ok_or_else(|| {
                    FormatError::malformed(format!("kv6 columns hold more than {count} voxels"))
                })?;
                if u32::from(record.z) >= height {
                    return Err(FormatError::malformed(format!(
                        "kv6 voxel at depth {} of {height}",
                        record.z
                    )));
                }
                let point = [x, (height - 1 - u32::from(record.z)) as i32, y];
                volume.set_voxel(point, Voxel::Generic(lookup.get_or_add(record.color)));
            }
        }
    }
    if !records.as_slice().is_empty() {
        log::warn!("{} kv6 voxels belong to no column", records.len());
    }

    let [px, py, pz] = pivot;
    let pivot = GridVector::new(
        px.round() as i32,
        (height as f32 - pz).round() as i32,
        py.round() as i32,
    );
    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("kv6", volume)
            .with_palette(lookup.into_palette())
            .with_transform(Transform {
                pivot,
                ..Transform::IDENTITY
            }),
    );
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let MergedVolume { volume, palette } = merged_for_save(graph)?;
    let region = volume.region();
    let [width, height, length] = [region.width(), region.height(), region.depth()];
    FormatError::check_limit("kv6 width", width, MAX_WIDTH)?;
    FormatError::check_limit("kv6 length", length, MAX_WIDTH)?;
    FormatError::check_limit("kv6 height", height, MAX_HEIGHT)?;
    let lower = region.lower();

    let mut records = Vec::new();
    let mut column_lens = Vec::with_capacity((width * length) as usize);
    for x in 0..width as i32 {
        for z in 0..length as i32 {
            let before = records.len();
            // top to bottom
            for y in (0..height as i32).rev() {
                let point = lower + GridVector::new(x, y, z);
                let visibility = face_visibility(&volume, point);
                if visibility == 0 {
                    continue;
                }
                if let Voxel::Generic(index) = volume.voxel(point) {
                    records.push(Record {
                        color: palette.color(index),
                        z: (height as i32 - 1 - y) as u8,
                        visibility,
                    });
                }
            }
            column_lens.push((records.len() - before) as u16);
        }
    }
    FormatError::check_limit("kv6 voxel count", records.len() as u64, MAX_VOXELS)?;

    // the pivot of the first model, moved into the merged volume
    let pivot = graph
        .model_nodes()
        .next()
        .and_then(|(id, node)| {
            let model_lower: GridPoint = graph.world_region(id)?.lower();
            checked_add_vectors(node.transform().pivot, model_lower - lower)
        })
        .unwrap_or_default();

    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    for s in [width, length, height] {
        w.write_u32_le(s);
    }
    w.write_f32_le(pivot.x as f32);
    w.write_f32_le(pivot.z as f32);
    w.write_f32_le(height as f32 - pivot.y as f32);
    w.write_u32_le(records.len() as u32);
    for record in &records {
        let color = record.color;
        w.write_bytes(&[color.b(), color.g(), color.r(), SLAB6_MARKER, record.z, 0]);
        w.write_bytes(&[record.visibility, NO_DIRECTION]);
    }
    for x_lens in column_lens.chunks(length as usize) {
        w.write_u32_le(x_lens.iter().map(|&n| u32::from(n)).sum());
    }
    for &n in &column_lens {
        w.write_u16_le(n);
    }
    w.write_bytes(PALETTE_MAGIC);
    write_vga_palette(&mut w, &palette);
    Ok(w.into_inner())
}
