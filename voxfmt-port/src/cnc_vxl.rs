//! Command & Conquer (Tiberian Sun, Red Alert 2) `.vxl` voxel animations.
//!
//! A file is a fixed-size header with a 256-color RGB palette, one header per layer,
//! the span data of every layer, and then one trailing info block per layer holding its
//! size, bounds and transform. Columns run along the file's Z axis, which is our Y; the
//! file's Y axis is our Z, inverted.
//!
//! Voxel normals are read and discarded, and written as zero.

use voxfmt::math::{GridPoint, GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{Palette, RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::util::{check_save_size, truncated_name, volume_from_size, world_lower};

#[cfg(test)]
mod tests;

const MAGIC: &str = "Voxel Animation\0";
/// Magic, four counts, palette remap range and the palette.
const HEADER_LEN: usize = 16 + 4 * 4 + 2 + 256 * 3;
const LAYER_HEADER_LEN: usize = 16 + 3 * 4;
const NAME_LEN: usize = 16;
const MAX_LAYERS: u32 = 512;
const MAX_LAYER_SIZE: u32 = 255;
/// Span offset marking a column with no voxels.
const EMPTY_COLUMN: i32 = -1;
/// Section scale written to every layer info.
const SCALE: f32 = 1.0 / 12.0;
/// Red Alert 2 normals.
const NORMAL_TYPE: u8 = 4;

#[derive(Debug)]
struct Header {
    layer_count: u32,
    info_count: u32,
    data_size: u32,
    palette: Palette,
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header, FormatError> {
    FormatError::check_magic(MAGIC, r.read_bytes(MAGIC.len())?)?;
    let palette_count = r.read_u32_le()?;
    let layer_count = r.read_u32_le()?;
    let info_count = r.read_u32_le()?;
    let data_size = r.read_u32_le()?;
    log::debug!(
        "vxl: {palette_count} palettes, {layer_count} layers, {info_count} infos, \
        {data_size} bytes of span data"
    );
    FormatError::check_limit("vxl layer count", layer_count, MAX_LAYERS)?;

    // the first palette that is not entirely black is used
    let mut palette = None;
    for _ in 0..palette_count {
        let [remap_start, remap_end] = r.read_array()?;
        log::debug!("vxl palette remap range {remap_start}..={remap_end}");
        let rgb = r.read_bytes(256 * 3)?;
        if palette.is_none() && rgb.iter().any(|&c| c != 0) {
            palette = Some(Palette::from_colors(
                rgb.chunks_exact(3).map(|c| Rgba::rgb(c[0], c[1], c[2])),
            )?);
        }
    }
    let palette = palette.unwrap_or_else(|| {
        log::debug!("no palette in vxl file; using the built-in palette");
        Palette::builtin()
    });
    Ok(Header {
        layer_count,
        info_count,
        data_size,
        palette,
    })
}

/// Reads a fixed-length, zero-padded name.
fn read_name(r: &mut ByteReader<'_>) -> Result<String, FormatError> {
    let bytes = r.read_bytes(NAME_LEN)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

#[derive(Debug)]
struct LayerInfo {
    span_start_offset: u32,
    span_data_offset: u32,
    /// Rows of a 3×4 matrix.
    transform: [[f32; 4]; 3],
    mins: [f32; 3],
    /// Width, depth and height in file axes.
    size: [u8; 3],
}

impl LayerInfo {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let span_start_offset = r.read_u32_le()?;
        let span_end_offset = r.read_u32_le()?;
        let span_data_offset = r.read_u32_le()?;
        let scale = r.read_f32_le()?;
        let mut transform = [[0.0; 4]; 3];
        for row in &mut transform {
            for value in row {
                *value = r.read_f32_le()?;
            }
        }
        let mins = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
        let maxs = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
        let size = r.read_array()?;
        let normal_type = r.read_u8()?;
        log::debug!(
            "vxl layer info: spans {span_start_offset}/{span_end_offset}/{span_data_offset}, \
            scale {scale}, bounds {mins:?}..{maxs:?}, size {size:?}, normal type {normal_type}"
        );
        Ok(Self {
            span_start_offset,
            span_data_offset,
            transform,
            mins,
            size,
        })
    }

    /// Size in our axis order.
    fn our_size(&self) -> [u32; 3] {
        let [x, y, z] = self.size.map(u32::from);
        [x, z, y]
    }

    fn our_transform(&self) -> Transform {
        let [tx, ty, tz] = [0, 1, 2].map(|row| self.transform[row][3].round() as i32);
        let [mx, my, mz] = self.mins.map(|m| (-m).round() as i32);
        Transform {
            translation: GridVector::new(tx, tz, ty),
            pivot: GridVector::new(mx, mz, my),
        }
    }
}

fn read_layer(
    r: &mut ByteReader<'_>,
    body_start: usize,
    info: &LayerInfo,
) -> Result<RawVolume, FormatError> {
    let [file_x, file_y, file_z] = info.size.map(usize::from);
    let mut volume = volume_from_size("vxl layer", info.our_size(), MAX_LAYER_SIZE)?;
    let column_count = file_x * file_y;

    r.seek(body_start + info.span_start_offset as usize)?;
    let starts = (0..column_count)
        .map(|_| r.read_i32_le())
        .collect::<Result<Vec<i32>, _>>()?;
    let ends = (0..column_count)
        .map(|_| r.read_i32_le())
        .collect::<Result<Vec<i32>, _>>()?;
    let data_start = r.pos();
    if data_start - body_start != info.span_data_offset as usize {
        return Err(FormatError::malformed(format!(
            "vxl span data offset {} does not follow the span tables",
            info.span_data_offset
        )));
    }

    for (i, (&start, &end)) in starts.iter().zip(&ends).enumerate() {
        if start == EMPTY_COLUMN || end == EMPTY_COLUMN {
            continue;
        }
        let start = usize::try_from(start)
            .map_err(|_| FormatError::malformed(format!("vxl span offset {start} is negative")))?;
        r.seek(data_start + start)?;
        let x = (i % file_x) as i32;
        let z = (file_y - 1 - i / file_x) as i32;
        let mut y = 0;
        while y < file_z {
            let skip = r.read_u8()?;
            let count = r.read_u8()?;
            if skip == 0 && count == 0 {
                return Err(FormatError::malformed("vxl span entry with no voxels"));
            }
            y += usize::from(skip);
            for _ in 0..count {
                let [color, _normal] = r.read_array()?;
                volume.set_voxel(GridPoint::new(x, y as i32, z), Voxel::Generic(color));
                y += 1;
            }
            // the count is repeated after the voxels
            r.skip(1)?;
        }
    }
    Ok(volume)
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let header = read_header(r)?;
    let names = (0..header.layer_count)
        .map(|_| {
            let name = read_name(r)?;
            let info_index = r.read_u32_le()?;
            // two fields which are always 1 and 2
            r.skip(8)?;
            log::debug!("vxl layer {name:?}, info {info_index}");
            Ok(name)
        })
        .collect::<Result<Vec<String>, FormatError>>()?;

    let body_start = r.pos();
    r.skip(header.data_size as usize)?;
    if header.info_count < header.layer_count {
        return Err(FormatError::malformed(format!(
            "{} vxl layers but {} layer infos",
            header.layer_count, header.info_count
        )));
    }
    let infos = (0..header.info_count)
        .map(|_| LayerInfo::read(r))
        .collect::<Result<Vec<LayerInfo>, FormatError>>()?;

    let mut graph = SceneGraph::new();
    for (name, info) in names.into_iter().zip(&infos) {
        let volume = read_layer(r, body_start, info)?;
        graph.add_to_root(
            SceneNode::model(name, volume)
                .with_palette(header.palette.clone())
                .with_transform(info.our_transform()),
        );
    }
    Ok(graph)
}

pub(crate) fn load_palette(bytes: &[u8]) -> Result<Palette, FormatError> {
    Ok(read_header(&mut ByteReader::new(bytes))?.palette)
}

// -------------------------------------------------------------------------------------------------

/// Encodes one column of our volume, bottom to top, as span entries.
fn encode_column(volume: &RawVolume, x: i32, z: i32, out: &mut ByteWriter) {
    let region = volume.region();
    let mut skip: u8 = 0;
    let mut y = region.lower().y;
    while y <= region.upper().y {
        let run: Vec<u8> = (y..=region.upper().y)
            .map_while(|y| volume.voxel([x, y, z]).color_index())
            .collect();
        if run.is_empty() {
            skip += 1;
            y += 1;
            continue;
        }
        out.write_u8(skip);
        out.write_u8(run.len() as u8);
        for &color in &run {
            out.write_bytes(&[color, 0]);
        }
        out.write_u8(run.len() as u8);
        y += run.len() as i32;
        skip = 0;
    }
    if skip > 0 {
        out.write_bytes(&[skip, 0, 0]);
    }
}

struct LayerOffsets {
    start: u32,
    end: u32,
    data: u32,
}

fn write_layer(w: &mut ByteWriter, body_start: usize, volume: &RawVolume) -> LayerOffsets {
    let region = volume.region();
    let (width, depth) = (region.width() as i32, region.depth() as i32);
    let lower = region.lower();
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    let mut data = ByteWriter::new();
    for i in 0..width * depth {
        let x = lower.x + i % width;
        let z = lower.z + depth - 1 - i / width;
        if (lower.y..=region.upper().y).all(|y| volume.voxel([x, y, z]).is_air()) {
            starts.push(EMPTY_COLUMN);
            ends.push(EMPTY_COLUMN);
            continue;
        }
        let column_start = data.len();
        encode_column(volume, x, z, &mut data);
        starts.push(column_start as i32);
        ends.push(data.len() as i32 - 1);
    }

    let start = (w.pos() - body_start) as u32;
    for s in starts {
        w.write_i32_le(s);
    }
    let end = (w.pos() - body_start) as u32;
    for e in ends {
        w.write_i32_le(e);
    }
    let data_offset = (w.pos() - body_start) as u32;
    w.write_bytes(data.as_slice());
    LayerOffsets {
        start,
        end,
        data: data_offset,
    }
}

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let (palette, volumes) = graph.models_with_shared_palette();
    FormatError::check_limit("vxl layer count", volumes.len() as u64, MAX_LAYERS)?;
    for (_, volume) in &volumes {
        check_save_size("vxl layer size", volume.region(), MAX_LAYER_SIZE)?;
    }
    let layer_count = volumes.len() as u32;

    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    w.write_u32_le(1);
    w.write_u32_le(layer_count);
    w.write_u32_le(layer_count);
    let data_size = w.reserve_u32_le();
    w.write_bytes(&[16, 31]);
    for i in 0..=u8::MAX {
        let [r, g, b, _] = palette.get(i).unwrap_or(Rgba::BLACK).to_array();
        w.write_bytes(&[r, g, b]);
    }
    debug_assert_eq!(w.len(), HEADER_LEN);

    for (index, (id, _)) in volumes.iter().enumerate() {
        let name = graph.node(*id).map_or("", |node| node.name());
        let name = truncated_name(name, NAME_LEN - 1);
        w.write_string(name);
        w.write_bytes(&vec![0; NAME_LEN - name.len()]);
        w.write_u32_le(index as u32);
        w.write_u32_le(1);
        w.write_u32_le(2);
    }
    debug_assert_eq!(w.len(), HEADER_LEN + LAYER_HEADER_LEN * volumes.len());

    let body_start = w.pos();
    let offsets: Vec<LayerOffsets> = volumes
        .iter()
        .map(|(_, volume)| write_layer(&mut w, body_start, volume))
        .collect();
    let body_size = (w.pos() - body_start) as u32;
    w.patch_u32_le(data_size, body_size);

    for ((id, volume), offsets) in volumes.iter().zip(offsets) {
        let region = volume.region();
        let node = graph.node(*id);
        let translation = world_lower(graph, *id)?;
        let pivot = node.map_or(GridVector::zero(), |n| n.transform().pivot);

        w.write_u32_le(offsets.start);
        w.write_u32_le(offsets.end);
        w.write_u32_le(offsets.data);
        w.write_f32_le(SCALE);
        let file_translation = [translation.x, translation.z, translation.y];
        for (row, t) in file_translation.into_iter().enumerate() {
            for col in 0..3 {
                w.write_f32_le(if row == col { 1.0 } else { 0.0 });
            }
            w.write_f32_le(t as f32);
        }
        let file_size = [region.width(), region.depth(), region.height()];
        let mins = [pivot.x, pivot.z, pivot.y].map(|p| -(p as f32));
        for m in mins {
            w.write_f32_le(m);
        }
        for (m, s) in mins.into_iter().zip(file_size) {
            w.write_f32_le(m + s as f32);
        }
        for s in file_size {
            w.write_u8(s as u8);
        }
        w.write_u8(NORMAL_TYPE);
    }
    Ok(w.into_inner())
}
