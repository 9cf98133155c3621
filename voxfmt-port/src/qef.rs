//! Qubicle Exchange `.qef`: a line-based text format with a palette of floating point
//! colors and one `x z y index mask` line per voxel.

use voxfmt::math::{GridPoint, GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{MergedVolume, Palette, RawVolume, SceneGraph, Voxel};

use crate::FormatError;
use crate::util::{merged_for_save, parse_numbers, single_model_graph, volume_from_size};


const MAGIC: &str = "Qubicle Exchange Format";
const VERSION: &str = "Version 0.2";
const WEBSITE: &str = "www.minddesk.com";
const MAX_LINE_LEN: usize = 256;
const MAX_SIZE: u32 = 1024;

/// Bits of the visibility mask; bit 0 marks a voxel with any exposed face.
const MASK_VISIBLE: u8 = 1;
const MASK_FACES: [(u8, [i32; 3]); 6] = [
    (2, [-1, 0, 0]),
    (4, [1, 0, 0]),
    (8, [0, 1, 0]),
    (16, [0, -1, 0]),
    (32, [0, 0, -1]),
    (64, [0, 0, 1]),
];

struct Header {
    /// Our x, y, z.
    size: [u32; 3],
    palette: Palette,
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header, FormatError> {
    let magic = r.read_line(MAX_LINE_LEN)?;
    FormatError::check_magic(MAGIC, magic.trim_end().as_bytes())?;
    let version = r.read_line(MAX_LINE_LEN)?;
    if version.trim_end() != VERSION {
        log::warn!("unexpected qef version line {version:?}");
    }
    let _website = r.read_line(MAX_LINE_LEN)?;

    let [width, depth, height] = parse_numbers("qef size", &r.read_line(MAX_LINE_LEN)?)?;
    let [color_count] = parse_numbers::<u32, 1>("qef color count", &r.read_line(MAX_LINE_LEN)?)?;
    FormatError::check_limit("qef color count", color_count, voxfmt::MAX_COLORS as u32)?;
    let colors = (0..color_count)
        .map(|_| {
            let rgb: [f32; 3] = parse_numbers("qef color", &r.read_line(MAX_LINE_LEN)?)?;
            let [red, green, blue] = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            Ok(Rgba::rgb(red, green, blue))
        })
        .collect::<Result<Vec<Rgba>, FormatError>>()?;
    Ok(Header {
        size: [width, height, depth],
        palette: Palette::from_colors(colors)?,
    })
}

pub(crate) fn load_palette(bytes: &[u8]) -> Result<Palette, FormatError> {
    Ok(read_header(&mut ByteReader::new(bytes))?.palette)
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let Header { size, palette } = read_header(r)?;
    let mut volume = volume_from_size("qef size", size, MAX_SIZE)?;

    while !r.is_eof() {
        let line = r.read_line(MAX_LINE_LEN)?;
        if line.trim().is_empty() {
            continue;
        }
        let [x, z, y, index, _mask] = parse_numbers::<i64, 5>("qef voxel", &line)?;
        let index = u8::try_from(index)
            .ok()
            .filter(|&i| usize::from(i) < palette.color_count())
            .ok_or_else(|| {
                FormatError::malformed(format!(
                    "qef color index {index} outside palette of {}",
                    palette.color_count()
                ))
            })?;
        let point = [x, y, z].map(|c| i32::try_from(c).unwrap_or(i32::MAX));
        if !volume.set_voxel(point, Voxel::Generic(index)) {
            return Err(FormatError::malformed(format!(
                "qef voxel {x} {z} {y} outside size {size:?}"
            )));
        }
    }
    Ok(single_model_graph("qef", volume, palette))
}

// -------------------------------------------------------------------------------------------------

fn visibility_mask(volume: &RawVolume, point: GridPoint) -> u8 {
    let faces = MASK_FACES
        .into_iter()
        .filter(|&(_, offset)| volume.voxel(point + GridVector::from(offset)) == Voxel::Air)
        .fold(0, |mask, (bit, _)| mask | bit);
    if faces == 0 { 0 } else { faces | MASK_VISIBLE }
}

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let MergedVolume { volume, palette } = merged_for_save(graph)?;
    let region = volume.region();
    let lower = region.lower();

    let mut w = ByteWriter::new();
    w.write_string(&format!("{MAGIC}\n{VERSION}\n{WEBSITE}\n"));
    w.write_string(&format!(
        "{} {} {}\n",
        region.width(),
        region.depth(),
        region.height()
    ));
    w.write_string(&format!("{}\n", palette.color_count()));
    for color in palette.colors() {
        let [red, green, blue] = [color.r(), color.g(), color.b()].map(|c| f32::from(c) / 255.0);
        w.write_string(&format!("{red:.6} {green:.6} {blue:.6}\n"));
    }
    for (point, index) in volume.solid_voxels() {
        let p = point - lower;
        let mask = visibility_mask(&volume, point);
        w.write_string(&format!("{} {} {} {index} {mask}\n", p.x, p.z, p.y));
    }
    Ok(w.into_inner())
}
