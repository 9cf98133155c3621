//! Sandbox VoxEdit `.vxm` models, versions 4 (`VXM4`) to 12 (`VXMC`).
//!
//! Later versions add fields to the header in a strictly additive sequence, so the
//! reader branches on the version number at each optional field. Voxels are stored as
//! `(length, material)` runs in X-major, Z-fastest order, with X mirrored.

use voxfmt::math::{GridPoint, GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{Palette, RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::util::{check_save_size, merged_for_save, volume_from_size};


const MAGIC: &str = "VXM";
const MIN_VERSION: u32 = 4;
const MAX_VERSION: u32 = 12;
/// The version written by [`save()`].
const SAVE_VERSION: u32 = 5;
/// Material index of runs of empty space.
const EMPTY_PALETTE: u8 = 0xFF;
const MAX_SIZE: u32 = 256;
const MAX_TEXTURE_SIZE: u32 = 2048;
const MAX_TEXTURES: u32 = 0xFFFF;
const MAX_QUADS: u32 = 0x40000;
/// Bytes per quad: four vertices of a float position and an integer texture coordinate.
const QUAD_LEN: u64 = 4 * 20;
const MAX_NAME_LEN: usize = 1024;
/// Marks the optional palette selection at the end of version 10+ files.
const TRAILER_SENTINEL: u8 = 127;

fn parse_version(magic: [u8; 4]) -> Result<u32, FormatError> {
    FormatError::check_magic(MAGIC, &magic[..3])?;
    let version = match magic[3] {
        c @ b'0'..=b'9' => u32::from(c - b'0'),
        c @ b'A'..=b'C' => 10 + u32::from(c - b'A'),
        other => u32::from(other),
    };
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            what: "vxm",
            version,
        });
    }
    Ok(version)
}

fn version_char(version: u32) -> u8 {
    match version {
        0..=9 => b'0' + version as u8,
        _ => b'A' + (version - 10) as u8,
    }
}

fn read_size(r: &mut ByteReader<'_>) -> Result<[u32; 3], FormatError> {
    Ok([r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?])
}

/// Skips the precomputed surface description of version 9+ files.
fn skip_surface(r: &mut ByteReader<'_>, version: u32) -> Result<(), FormatError> {
    if r.read_u8()? == 0 {
        return Ok(());
    }
    let [start_x, start_y, start_z] = read_size(r)?;
    let [end_x, end_y, end_z] = read_size(r)?;
    let normal = r.read_u32_le()?;
    let (width, height) = if version >= 10 {
        (r.read_u32_le()?, r.read_u32_le()?)
    } else {
        let span = |start: u32, end: u32| end.wrapping_sub(start);
        match normal {
            0 | 1 => (span(start_z, end_z), span(start_y, end_y)),
            2 | 3 => (span(start_x, end_x), span(start_z, end_z)),
            4 | 5 => (span(start_x, end_x), span(start_y, end_y)),
            _ => (0, 0),
        }
    };
    r.skip(width as usize * height as usize)?;
    Ok(())
}

/// Skips the baked textures and quads of one level of detail.
fn skip_lod(r: &mut ByteReader<'_>, version: u32) -> Result<(), FormatError> {
    let texture_size = [r.read_u32_le()?, r.read_u32_le()?];
    for dimension in texture_size {
        FormatError::check_limit("vxm texture size", dimension, MAX_TEXTURE_SIZE)?;
    }
    if version >= 11 {
        let zipped_len = r.read_u32_le()?;
        r.skip(zipped_len as usize)?;
    } else {
        let texture_count = r.read_u32_le()?;
        FormatError::check_limit("vxm texture count", texture_count, MAX_TEXTURES)?;
        for _ in 0..texture_count {
            let texture_id = r.read_cstring(MAX_NAME_LEN)?;
            if version >= 6 {
                let zipped_len = r.read_u32_le()?;
                r.skip(zipped_len as usize)?;
            } else {
                log::debug!("skipping vxm texture {texture_id:?}");
                // runs of RGB texels, terminated by a zero stride
                while r.read_u8()? != 0 {
                    r.skip(3)?;
                }
            }
        }
    }
    for _ in 0..6 {
        let quad_count = r.read_u32_le()?;
        FormatError::check_limit("vxm quad count", quad_count, MAX_QUADS)?;
        r.skip((u64::from(quad_count) * QUAD_LEN) as usize)?;
    }
    Ok(())
}

#[derive(Debug)]
struct Header {
    version: u32,
    size: [u32; 3],
    /// Relative to the size, in 0..=1 on each axis.
    normalized_pivot: [f32; 3],
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header, FormatError> {
    let version = parse_version(r.read_array()?)?;
    let mut size = [0; 3];
    let mut normalized_pivot = [0.5, 0.0, 0.5];
    if version >= 6 {
        size = read_size(r)?;
    }
    if version >= 5 {
        normalized_pivot = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
    }
    if version >= 9 {
        skip_surface(r, version)?;
    }
    if version >= 8 {
        // LOD scale and pivot
        r.skip(4 * 4)?;
    }
    let lod_levels = if version >= 7 { r.read_u32_le()? } else { 1 };
    for _ in 0..lod_levels {
        skip_lod(r, version)?;
    }
    if version <= 5 {
        size = read_size(r)?;
    }
    log::debug!("vxm version {version}: size {size:?}, pivot {normalized_pivot:?}");
    Ok(Header {
        version,
        size,
        normalized_pivot,
    })
}

/// Reads the material table, in which each entry is BGRA followed by an emissive flag.
fn read_palette(r: &mut ByteReader<'_>, version: u32) -> Result<Palette, FormatError> {
    if version >= 11 {
        // albedo and emissive RGBA palettes, duplicated by the material table
        r.skip(2 * 256 * 4)?;
        let chunk_count = r.read_u8()?;
        for _ in 0..chunk_count {
            let chunk_id = r.read_cstring(MAX_NAME_LEN)?;
            log::debug!("skipping vxm palette chunk {chunk_id:?}");
            // offset and length
            r.skip(2)?;
        }
    }
    let material_count = r.read_u8()?;
    let mut emissive_count = 0;
    let mut colors = Vec::with_capacity(usize::from(material_count));
    for _ in 0..material_count {
        let [blue, green, red, alpha] = r.read_array()?;
        if r.read_u8()? != 0 {
            emissive_count += 1;
        }
        colors.push(Rgba::new(red, green, blue, alpha));
    }
    if emissive_count > 0 {
        log::debug!("ignoring emission of {emissive_count} vxm materials");
    }
    Ok(Palette::from_colors(colors)?)
}

/// What a run's material byte refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RunMaterial {
    Empty,
    /// An index past the end of the material table. Such runs are skipped like empty
    /// runs, so that the rest of the model still loads.
    OutOfRange,
    Color(u8),
}

impl RunMaterial {
    fn classify(material: u8, palette: &Palette) -> Self {
        if material == EMPTY_PALETTE {
            RunMaterial::Empty
        } else if usize::from(material) >= palette.color_count() {
            RunMaterial::OutOfRange
        } else {
            RunMaterial::Color(material)
        }
    }
}

/// Converts the index of a voxel in storage order to our coordinates.
fn storage_to_ours([sx, sy, sz]: [u32; 3], i: u64) -> GridPoint {
    let (sx, sy, sz) = (u64::from(sx), u64::from(sy), u64::from(sz));
    let x = i / (sy * sz);
    let y = (i / sz) % sy;
    let z = i % sz;
    // x may exceed the size in an overlong body; such voxels land outside the volume
    GridPoint::new(sx as i32 - 1 - x.min(i32::MAX as u64) as i32, y as i32, z as i32)
}

fn read_model_voxels(
    r: &mut ByteReader<'_>,
    size: [u32; 3],
    palette: &Palette,
    volume: &mut RawVolume,
) -> Result<(), FormatError> {
    let mut index: u64 = 0;
    let mut skipped: u64 = 0;
    loop {
        let length = r.read_u8()?;
        if length == 0 {
            break;
        }
        let material = r.read_u8()?;
        match RunMaterial::classify(material, palette) {
            RunMaterial::Empty => {}
            RunMaterial::OutOfRange => skipped += u64::from(length),
            RunMaterial::Color(color) => {
                for i in index..index + u64::from(length) {
                    volume.set_voxel(storage_to_ours(size, i), Voxel::Generic(color));
                }
            }
        }
        index += u64::from(length);
    }
    if skipped > 0 {
        log::warn!(
            "skipped {skipped} vxm voxels whose material is outside the {} entry table",
            palette.color_count()
        );
    }
    Ok(())
}

/// Reads the optional data after the models of version 10+ files.
fn read_trailer(r: &mut ByteReader<'_>) -> Result<(), FormatError> {
    if r.read_u8()? != 0 {
        // surface start, end and normal
        r.skip(7 * 4)?;
    }
    // a "template model resized" flag that is not always written
    if !r.is_eof() && r.peek_u8()? != TRAILER_SENTINEL {
        r.skip(1)?;
    }
    if r.is_eof() {
        return Ok(());
    }
    if r.read_u8()? != TRAILER_SENTINEL {
        log::warn!("vxm trailer sentinel missing; ignoring the rest of the file");
        return Ok(());
    }
    let selected_palette = r.read_u8()?;
    if selected_palette != 255 {
        // 255 colors and emissive flags of the selected palette
        r.skip(255 * 5)?;
    }
    Ok(())
}

fn pivot_from_normalized(normalized: [f32; 3], [sx, sy, sz]: [u32; 3]) -> GridVector {
    let scale = |n: f32, s: u32| (n * s as f32).round() as i32;
    GridVector::new(
        scale(normalized[0], sx),
        scale(normalized[1], sy),
        scale(normalized[2], sz),
    )
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let Header {
        version,
        size,
        normalized_pivot,
    } = read_header(r)?;
    let palette = read_palette(r, version)?;

    let model_count = if version >= 12 { r.read_u8()? } else { 1 };
    let mut graph = SceneGraph::new();
    for model in 0..model_count {
        let (name, visible) = if version >= 12 {
            (r.read_cstring(MAX_NAME_LEN)?, r.read_u8()? != 0)
        } else {
            (format!("Model {model}"), true)
        };
        let mut volume = volume_from_size("vxm volume", size, MAX_SIZE)?;
        read_model_voxels(r, size, &palette, &mut volume)?;
        graph.add_to_root(
            SceneNode::model(name, volume)
                .with_palette(palette.clone())
                .with_visible(visible)
                .with_transform(Transform {
                    translation: GridVector::zero(),
                    pivot: pivot_from_normalized(normalized_pivot, size),
                })
                .with_property("vxmversion", version.to_string()),
        );
    }
    if version >= 10 {
        read_trailer(r)?;
    }
    Ok(graph)
}

pub(crate) fn load_palette(bytes: &[u8]) -> Result<Palette, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let header = read_header(r)?;
    read_palette(r, header.version)
}

// -------------------------------------------------------------------------------------------------

fn write_run(w: &mut ByteWriter, length: usize, voxel: Voxel) {
    w.write_u8(length as u8);
    w.write_u8(voxel.color_index().unwrap_or(EMPTY_PALETTE));
}

/// Writes a version 5 file holding all models merged into one.
pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let merged = merged_for_save(graph)?;
    let region = merged.volume.region();
    check_save_size("vxm volume size", region, MAX_SIZE)?;
    let palette = merged.palette;
    // the last index is reserved for empty space
    let color_count = palette.color_count().min(usize::from(EMPTY_PALETTE));
    if color_count == 0 {
        return Err(FormatError::Unsupported("vxm needs at least one palette color".into()));
    }
    let replacement = palette
        .find_replacement(EMPTY_PALETTE)
        .unwrap_or(EMPTY_PALETTE - 1);

    let size = [region.width(), region.height(), region.depth()];
    let [sx, sy, sz] = size;
    let normalized_pivot = graph.model_nodes().next().map_or([0.5; 3], |(_, node)| {
        let pivot = node.transform().pivot;
        [
            pivot.x as f32 / sx as f32,
            pivot.y as f32 / sy as f32,
            pivot.z as f32 / sz as f32,
        ]
    });

    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    w.write_u8(version_char(SAVE_VERSION));
    for p in normalized_pivot {
        w.write_f32_le(p);
    }
    // one level of detail with no textures and no quads
    w.write_u32_le(0);
    w.write_u32_le(0);
    w.write_u32_le(0);
    for _ in 0..6 {
        w.write_u32_le(0);
    }
    for s in size {
        w.write_u32_le(s);
    }

    w.write_u8(color_count as u8);
    for &color in &palette.colors()[..color_count] {
        let [r, g, b, a] = color.to_array();
        w.write_bytes(&[b, g, r, a]);
        w.write_u8(0); // not emissive
    }

    let lower = region.lower().to_vector();
    let voxels = (0..u64::from(sx) * u64::from(sy) * u64::from(sz)).map(|i| {
        match merged.volume.voxel(storage_to_ours(size, i) + lower) {
            Voxel::Generic(index) if index == EMPTY_PALETTE => Voxel::Generic(replacement),
            voxel => voxel,
        }
    });
    let mut run: Option<(Voxel, usize)> = None;
    for voxel in voxels {
        run = match run {
            Some((current, length)) if current == voxel && length < 255 => {
                Some((current, length + 1))
            }
            Some((current, length)) => {
                write_run(&mut w, length, current);
                Some((voxel, 1))
            }
            None => Some((voxel, 1)),
        };
    }
    if let Some((current, length)) = run {
        write_run(&mut w, length, current);
    }
    w.write_u8(0);
    Ok(w.into_inner())
}
