//! Cubeworld `.cub`: three dimensions, then one RGB triple per voxel, with black
//! meaning empty.

use voxfmt::math::{GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{MergedVolume, PaletteLookup, SceneGraph, Voxel};

use crate::FormatError;
use crate::util::{merged_for_save, single_model_graph, volume_from_size};

#[cfg(test)]
mod tests;

const MAX_SIZE: u32 = 512;
/// Written in place of black, which would read back as empty.
const NEAR_BLACK: [u8; 3] = [0, 0, 1];

/// Visits every position in file order: x fastest, then z, then y.
fn for_each_position(
    [width, height, depth]: [u32; 3],
    mut f: impl FnMut(GridVector) -> Result<(), FormatError>,
) -> Result<(), FormatError> {
    for y in 0..height as i32 {
        for z in 0..depth as i32 {
            for x in 0..width as i32 {
                f(GridVector::new(x, y, z))?;
            }
        }
    }
    Ok(())
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let width = r.read_u32_le()?;
    let depth = r.read_u32_le()?;
    let height = r.read_u32_le()?;
    log::debug!("cub size {width}x{height}x{depth}");
    let mut volume = volume_from_size("cub size", [width, height, depth], MAX_SIZE)?;

    let mut lookup = PaletteLookup::default();
    for_each_position([width, height, depth], |position| {
        let [red, green, blue] = r.read_array()?;
        if [red, green, blue] != [0, 0, 0] {
            let index = lookup.get_or_add(Rgba::rgb(red, green, blue));
            volume.set_voxel(position.to_point(), Voxel::Generic(index));
        }
        Ok(())
    })?;
    if !r.is_eof() {
        log::warn!("ignoring {} bytes after cub voxels", r.remaining());
    }
    Ok(single_model_graph("cub", volume, lookup.into_palette()))
}

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let MergedVolume { volume, palette } = merged_for_save(graph)?;
    let region = volume.region();
    let size = region.size();
    let mut w = ByteWriter::new();
    w.write_u32_le(size.width);
    w.write_u32_le(size.depth);
    w.write_u32_le(size.height);

    let lower = region.lower();
    for_each_position([size.width, size.height, size.depth], |offset| {
        let rgb = match volume.voxel(lower + offset) {
            Voxel::Air => [0; 3],
            Voxel::Generic(index) => match palette.color(index) {
                color if color.is_transparent() => [0; 3],
                color => match [color.r(), color.g(), color.b()] {
                    [0, 0, 0] => NEAR_BLACK,
                    rgb => rgb,
                },
            },
        };
        w.write_bytes(&rgb);
        Ok(())
    })?;
    Ok(w.into_inner())
}
