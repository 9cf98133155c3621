//! Ace of Spades map `.vxl`: 512×512 columns of spans, each span an air gap, a run of
//! top colors, implied solid voxels, and a run of bottom colors.
//!
//! Map `z` grows downwards from the sky, so it becomes our `y` flipped; map `y` is our `z`.

use voxfmt::math::Rgba;
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{MergedVolume, Palette, PaletteLookup, SceneGraph, Voxel};

use crate::FormatError;
use crate::util::{merged_for_save, single_model_graph, volume_from_size};

#[cfg(test)]
mod tests;

const MAP_SIZE: u32 = 512;
const MIN_HEIGHT: u32 = 64;
const MAX_HEIGHT: u32 = 256;
/// Bytes of a span header, and of one color.
const WORD_LEN: usize = 4;
/// Color of solid voxels which are never visible and so carry no color in the file.
const HIDDEN_COLOR: Rgba = Rgba::rgb(0x67, 0x40, 0x28);
/// SLAB5 maps (Voxlap's own, 1024×1024) start with this, in either byte order.
const SLAB5_MAGIC: [u8; 4] = [0x09, 0x07, 0x20, 0x00];

/// Contents of one column, in map `z` coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Cell {
    Colored { z: u32, color: Rgba },
    /// Solid voxels from `top` down to `bottom` (exclusive), or to the floor of the map.
    Hidden { top: u32, bottom: Option<u32> },
}

impl Cell {
    /// The largest `z` this cell needs the map to contain.
    fn deepest(self) -> u32 {
        match self {
            Cell::Colored { z, .. } => z,
            // a span reaching the floor says nothing about where the floor is
            Cell::Hidden { top, bottom } => bottom.unwrap_or(top).saturating_sub(1),
        }
    }
}

fn read_color(r: &mut ByteReader<'_>) -> Result<Rgba, FormatError> {
    // the fourth byte is shading, not opacity
    let [blue, green, red, _] = r.read_array()?;
    Ok(Rgba::rgb(red, green, blue))
}

fn read_column(r: &mut ByteReader<'_>, cells: &mut Vec<(u32, Cell)>, column: u32) -> Result<(), FormatError> {
    loop {
        let [length, top_start, top_end, _air_start] = r.read_array()?;
        let top_start = u32::from(top_start);
        let top_len = (u32::from(top_end) + 1).checked_sub(top_start).ok_or_else(|| {
            FormatError::malformed(format!(
                "span colors end at {top_end} before they start at {top_start}"
            ))
        })?;
        for z in top_start..top_start + top_len {
            cells.push((column, Cell::Colored { z, color: read_color(r)? }));
        }
        let solid_start = top_start + top_len;

        if length == 0 {
            cells.push((column, Cell::Hidden { top: solid_start, bottom: None }));
            return Ok(());
        }

        let bottom_len = (u32::from(length) - 1).checked_sub(top_len).ok_or_else(|| {
            FormatError::malformed(format!(
                "span of length {length} cannot hold {top_len} top colors"
            ))
        })?;
        let bottom_colors = (0..bottom_len)
            .map(|_| read_color(r))
            .collect::<Result<Vec<Rgba>, FormatError>>()?;
        // bottom colors end where the air of the next span begins
        let next_air_start = u32::from(r.peek_bytes(WORD_LEN)?[3]);
        let bottom_start = next_air_start
            .checked_sub(bottom_len)
            .filter(|&start| start >= solid_start)
            .ok_or_else(|| {
                FormatError::malformed(format!(
                    "next span starts at {next_air_start}, overlapping {bottom_len} bottom colors"
                ))
            })?;
        if bottom_start > solid_start {
            cells.push((
                column,
                Cell::Hidden {
                    top: solid_start,
                    bottom: Some(bottom_start),
                },
            ));
        }
        for (z, color) in (bottom_start..).zip(bottom_colors) {
            cells.push((column, Cell::Colored { z, color }));
        }
    }
}

fn map_height(deepest: u32) -> Result<u32, FormatError> {
    let height = (deepest + 1).next_power_of_two().max(MIN_HEIGHT);
    FormatError::check_limit("aos vxl map height", height, MAX_HEIGHT)?;
    Ok(height)
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let magic = r.peek_bytes(WORD_LEN)?;
    if magic == SLAB5_MAGIC || magic.iter().rev().eq(SLAB5_MAGIC.iter()) {
        return Err(FormatError::Unsupported("SLAB5 1024×1024 maps".into()));
    }

    let mut cells = Vec::new();
    for column in 0..MAP_SIZE * MAP_SIZE {
        read_column(r, &mut cells, column)?;
    }
    if !r.is_eof() {
        log::warn!("ignoring {} bytes after the last vxl column", r.remaining());
    }
    let height = map_height(cells.iter().map(|&(_, cell)| cell.deepest()).max().unwrap_or(0))?;
    log::debug!("aos vxl map of height {height}, {} cells", cells.len());

    let mut volume = volume_from_size("aos vxl map", [MAP_SIZE, height, MAP_SIZE], MAP_SIZE)?;
    let mut lookup = PaletteLookup::new(Palette::builtin());
    for (column, cell) in cells {
        let x = (column % MAP_SIZE) as i32;
        let z = (column / MAP_SIZE) as i32;
        let our_y = |map_z: u32| (height - 1 - map_z) as i32;
        match cell {
            Cell::Colored { z: map_z, color } => {
                let voxel = Voxel::Generic(lookup.get_or_add(color));
                volume.set_voxel([x, our_y(map_z), z], voxel);
            }
            Cell::Hidden { top, bottom } => {
                let voxel = Voxel::Generic(lookup.get_or_add(HIDDEN_COLOR));
                for map_z in top..bottom.unwrap_or(height) {
                    volume.set_voxel([x, our_y(map_z), z], voxel);
                }
            }
        }
    }

    Ok(single_model_graph("map", volume, lookup.into_palette()))
}

// -------------------------------------------------------------------------------------------------

/// Writes one column, top to bottom. The last entry must be solid.
///
/// Every solid voxel is written with its color, so no span has bottom colors or
/// hidden voxels.
fn write_column(column: &[Option<Rgba>], w: &mut ByteWriter) {
    let height = column.len();
    let mut z = 0;
    loop {
        let air_start = z;
        while z < height && column[z].is_none() {
            z += 1;
        }
        let top_start = z;
        while z < height && column[z].is_some() {
            z += 1;
        }
        let last = z == height;
        let colors = &column[top_start..z];
        // A span other than the last is followed by air and the solid floor,
        // so it holds at most `MAX_HEIGHT - 2` colors.
        w.write_u8(if last { 0 } else { (colors.len() + 1) as u8 });
        w.write_u8(top_start as u8);
        w.write_u8((z - 1) as u8);
        w.write_u8(air_start as u8);
        for color in colors.iter().flatten() {
            w.write_bytes(&[color.b(), color.g(), color.r(), 0xFF]);
        }
        if last {
            return;
        }
    }
}

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let MergedVolume { volume, palette } = merged_for_save(graph)?;
    let region = volume.region();
    FormatError::check_limit("aos vxl map width", region.width(), MAP_SIZE)?;
    FormatError::check_limit("aos vxl map length", region.depth(), MAP_SIZE)?;
    let height = map_height(region.height() - 1)?;
    log::debug!("saving aos vxl map of height {height}");

    let lower = region.lower();
    let mut column = vec![None; height as usize];
    let mut w = ByteWriter::new();
    for map_y in 0..MAP_SIZE as i32 {
        for map_x in 0..MAP_SIZE as i32 {
            for (map_z, entry) in column.iter_mut().enumerate() {
                let y = height as i32 - 1 - map_z as i32;
                *entry = match volume.voxel([lower.x + map_x, lower.y + y, lower.z + map_y]) {
                    Voxel::Air => None,
                    Voxel::Generic(index) => Some(palette.color(index)),
                };
            }
            // the map has no holes in its floor
            if let Some(floor) = column.last_mut() {
                floor.get_or_insert(HIDDEN_COLOR);
            }
            write_column(&column, &mut w);
        }
    }
    Ok(w.into_inner())
}
