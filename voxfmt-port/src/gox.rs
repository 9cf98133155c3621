//! [Goxel](https://goxel.xyz/) `.gox` files: a sequence of chunks, where `BL16` chunks are
//! PNG images each holding a 16³ block of voxels and `LAYR` chunks place blocks to build
//! layers.
//!
//! The file's y is our z, and its x runs opposite to ours.

use std::collections::BTreeMap;
use std::io;

use voxfmt::math::{GridPoint, Region, Rgba, checked_offset};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{NodeId, PaletteLookup, RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::util::world_translation;


const MAGIC: &str = "GOX ";
const VERSION: i32 = 2;
const BLOCK_SIZE: i32 = 16;
/// Blocks are stored as square images of this width and height.
const IMAGE_SIZE: u32 = 64;
const MAX_DICT_LEN: i32 = 256;

const CHUNK_BLOCK: &[u8; 4] = b"BL16";
const CHUNK_LAYER: &[u8; 4] = b"LAYR";
const CHUNK_MATERIAL: &[u8; 4] = b"MATE";

/// Converts between file coordinates and ours.
fn from_file(p: [i32; 3]) -> GridPoint {
    GridPoint::new(-1 - p[0], p[2], p[1])
}

fn to_file(p: GridPoint) -> [i32; 3] {
    [-1 - p.x, p.z, p.y]
}

/// File position of the lower corner of a block stored at `raw`, checked so that every
/// voxel of the block is representable.
fn block_origin(raw: [i32; 3], bias: i32) -> Result<[i32; 3], FormatError> {
    let mut origin = [0; 3];
    for (o, c) in origin.iter_mut().zip(raw) {
        *o = c
            .checked_sub(bias)
            .filter(|o| o.checked_add(BLOCK_SIZE - 1).is_some())
            .ok_or_else(|| {
                FormatError::malformed(format!(
                    "gox block position {raw:?} is outside the coordinate range"
                ))
            })?;
    }
    Ok(origin)
}

/// Position of a voxel within the pixels of a block image.
fn pixel_index(local: [i32; 3]) -> usize {
    ((local[2] * BLOCK_SIZE + local[1]) * BLOCK_SIZE + local[0]) as usize
}

/// Reads key/value pairs until the end of a chunk. An empty key also ends the dictionary.
fn read_dict<'a>(r: &mut ByteReader<'a>) -> Result<Vec<(String, &'a [u8])>, FormatError> {
    let mut entries = Vec::new();
    while !r.is_eof() {
        let key_len = r.read_i32_le()?;
        if key_len == 0 {
            log::warn!("empty gox dictionary key");
            break;
        }
        let key = r.read_string(dict_len("key", key_len)?)?;
        let value_len = r.read_i32_le()?;
        let value = r.read_bytes(dict_len("value", value_len)?)?;
        entries.push((key, value));
    }
    Ok(entries)
}

fn dict_len(what: &str, len: i32) -> Result<usize, FormatError> {
    if (0..MAX_DICT_LEN).contains(&len) {
        Ok(len as usize)
    } else {
        Err(FormatError::malformed(format!(
            "gox dictionary {what} length {len}"
        )))
    }
}

fn dict_i32(value: &[u8]) -> Option<i32> {
    Some(i32::from_le_bytes(value.get(..4)?.try_into().ok()?))
}

fn read_block(png: &[u8]) -> Result<image::RgbaImage, FormatError> {
    let image = image::load_from_memory_with_format(png, image::ImageFormat::Png)?.into_rgba8();
    if image.dimensions() != (IMAGE_SIZE, IMAGE_SIZE) {
        return Err(FormatError::malformed(format!(
            "gox block image of {:?} pixels",
            image.dimensions()
        )));
    }
    Ok(image)
}

struct Loader {
    version: i32,
    blocks: Vec<image::RgbaImage>,
    lookup: PaletteLookup,
    layers: Vec<SceneNode>,
}

impl Loader {
    fn read_layer(&mut self, r: &mut ByteReader<'_>) -> Result<(), FormatError> {
        let block_count = r.read_u32_le()?;
        let mut voxels: Vec<(GridPoint, u8)> = Vec::new();
        for _ in 0..block_count {
            let index = r.read_u32_le()?;
            let raw = [r.read_i32_le()?, r.read_i32_le()?, r.read_i32_le()?];
            r.skip(4)?;
            // version 1 stored block centers
            let position = block_origin(raw, if self.version == 1 { 8 } else { 0 })?;
            let block = self.blocks.get(index as usize).ok_or_else(|| {
                FormatError::malformed(format!(
                    "gox layer refers to block {index} of {}",
                    self.blocks.len()
                ))
            })?;
            for (i, pixel) in block.pixels().enumerate() {
                let image::Rgba([red, green, blue, alpha]) = *pixel;
                if alpha == 0 {
                    continue;
                }
                let i = i as i32;
                let local = [i % BLOCK_SIZE, i / BLOCK_SIZE % BLOCK_SIZE, i / (BLOCK_SIZE * BLOCK_SIZE)];
                let point = from_file([0, 1, 2].map(|axis| position[axis] + local[axis]));
                voxels.push((point, self.lookup.get_or_add(Rgba::rgb(red, green, blue))));
            }
        }

        let mut node_name = format!("layer {}", self.layers.len());
        let mut visible = true;
        let mut properties = Vec::new();
        for (key, value) in read_dict(r)? {
            match key.as_str() {
                "name" => {
                    node_name = String::from_utf8_lossy(value).trim_end_matches('\0').to_owned();
                }
                "visible" => visible = value.first().is_some_and(|&b| b != 0),
                "img-path" => properties.push((
                    key,
                    String::from_utf8_lossy(value).trim_end_matches('\0').to_owned(),
                )),
                "id" | "base_id" | "material" => {
                    if let Some(number) = dict_i32(value) {
                        properties.push((key, number.to_string()));
                    }
                }
                _ => log::debug!("ignoring gox layer entry {key:?} of {} bytes", value.len()),
            }
        }

        let Some(bounds) = voxels
            .iter()
            .map(|&(point, _)| Region::single(point))
            .reduce(Region::union)
        else {
            log::warn!("skipping empty gox layer {node_name:?}");
            return Ok(());
        };
        let offset = bounds.lower().to_vector();
        let mut volume = RawVolume::new(Region::checked_from_size(bounds.size())?)?;
        for (point, index) in voxels {
            volume.set_voxel(point - offset, Voxel::Generic(index));
        }
        let mut node = SceneNode::model(node_name, volume)
            .with_visible(visible)
            .with_transform(Transform::from_translation(offset));
        for (key, value) in properties {
            node.set_property(key, value);
        }
        self.layers.push(node);
        Ok(())
    }
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    FormatError::check_magic(MAGIC, r.read_bytes(4)?)?;
    let version = r.read_i32_le()?;
    if !(1..=VERSION).contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            what: "gox",
            version: version as u32,
        });
    }

    let mut loader = Loader {
        version,
        blocks: Vec::new(),
        lookup: PaletteLookup::default(),
        layers: Vec::new(),
    };
    while !r.is_eof() {
        let chunk_type: [u8; 4] = r.read_array()?;
        let length = r.read_i32_le()?;
        let length = usize::try_from(length).map_err(|_| {
            FormatError::malformed(format!("gox chunk length {length}"))
        })?;
        let payload = &mut ByteReader::new(r.read_bytes(length)?);
        // CRC, which is not checked
        r.skip(4)?;

        match &chunk_type {
            CHUNK_BLOCK => loader.blocks.push(read_block(payload.rest())?),
            CHUNK_LAYER => loader.read_layer(payload)?,
            _ => log::debug!(
                "skipping gox chunk {} of {length} bytes",
                chunk_type.escape_ascii()
            ),
        }
    }

    if loader.layers.is_empty() {
        return Err(FormatError::EmptyScene);
    }
    let palette = loader.lookup.into_palette();
    let mut graph = SceneGraph::new();
    for layer in loader.layers {
        graph.add_to_root(layer.with_palette(palette.clone()));
    }
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

/// Writes a chunk whose length covers whatever `body` writes, followed by an unset CRC.
fn write_chunk(
    w: &mut ByteWriter,
    chunk_type: &[u8; 4],
    body: impl FnOnce(&mut ByteWriter) -> Result<(), FormatError>,
) -> Result<(), FormatError> {
    w.write_bytes(chunk_type);
    let length = w.reserve_u32_le();
    body(w)?;
    w.patch_size_since(length)?;
    w.write_u32_le(0);
    Ok(())
}

fn write_dict_entry(w: &mut ByteWriter, key: &str, value: &[u8]) {
    w.write_u32_le(key.len() as u32);
    w.write_string(key);
    w.write_u32_le(value.len() as u32);
    w.write_bytes(value);
}

fn float_bytes<const N: usize>(values: [f32; N]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Block images of one layer, keyed by the file position of the block in z, y, x order
/// so that iteration follows the order blocks are written in.
type LayerBlocks = BTreeMap<[i32; 3], image::RgbaImage>;

fn layer_blocks(
    graph: &SceneGraph,
    id: NodeId,
    volume: &RawVolume,
) -> Result<LayerBlocks, FormatError> {
    let palette = graph.resolved_palette(id);
    let translation = world_translation(graph, id)?;
    let mut blocks = LayerBlocks::new();
    for (point, index) in volume.solid_voxels() {
        let world = checked_offset(point, translation).ok_or_else(|| {
            FormatError::malformed(format!("voxel {point:?} of node {id} is out of range"))
        })?;
        let file = to_file(world);
        let block = file.map(|c| c.div_euclid(BLOCK_SIZE) * BLOCK_SIZE);
        let local = file.map(|c| c.rem_euclid(BLOCK_SIZE));
        let pixel = pixel_index(local) as u32;
        let color = palette.color(index);
        blocks
            .entry([block[2], block[1], block[0]])
            .or_insert_with(|| image::RgbaImage::new(IMAGE_SIZE, IMAGE_SIZE))
            .put_pixel(
                pixel % IMAGE_SIZE,
                pixel / IMAGE_SIZE,
                image::Rgba([color.r(), color.g(), color.b(), u8::MAX]),
            );
    }
    Ok(blocks)
}

fn encode_png(image: &image::RgbaImage) -> Result<Vec<u8>, FormatError> {
    let mut cursor = io::Cursor::new(Vec::new());
    image.write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Saves each model as a layer. Colors are written opaque.
pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let mut layers: Vec<(&SceneNode, LayerBlocks)> = Vec::new();
    for (id, node) in graph.model_nodes() {
        if let Some(volume) = node.volume() {
            layers.push((node, layer_blocks(graph, id, volume)?));
        }
    }
    let first_palette = graph
        .model_nodes()
        .next()
        .map(|(id, _)| graph.resolved_palette(id))
        .ok_or(FormatError::EmptyScene)?;

    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    w.write_i32_le(VERSION);

    for (_, blocks) in &layers {
        for image in blocks.values() {
            let png = encode_png(image)?;
            write_chunk(&mut w, CHUNK_BLOCK, |w| {
                w.write_bytes(&png);
                Ok(())
            })?;
        }
    }

    write_chunk(&mut w, CHUNK_MATERIAL, |w| {
        for (i, color) in first_palette.colors().iter().enumerate() {
            write_dict_entry(w, "name", format!("mat{i}").as_bytes());
            let [red, green, blue, alpha] = color.to_array().map(|c| f32::from(c) / 255.0);
            write_dict_entry(w, "color", &float_bytes([red, green, blue, alpha]));
            write_dict_entry(w, "metallic", &float_bytes([0.0]));
            write_dict_entry(w, "roughness", &float_bytes([0.0]));
            write_dict_entry(w, "emission", &float_bytes([0.0; 3]));
        }
        Ok(())
    })?;

    let mut block_index = 0u32;
    for (layer_id, (node, blocks)) in layers.iter().enumerate() {
        write_chunk(&mut w, CHUNK_LAYER, |w| {
            w.write_u32_le(blocks.len() as u32);
            for &[z, y, x] in blocks.keys() {
                w.write_u32_le(block_index);
                w.write_i32_le(x);
                w.write_i32_le(y);
                w.write_i32_le(z);
                w.write_u32_le(0);
                block_index += 1;
            }
            write_dict_entry(w, "name", node.name().as_bytes());
            let identity: [f32; 16] =
                std::array::from_fn(|i| if i % 5 == 0 { 1.0 } else { 0.0 });
            write_dict_entry(w, "mat", &float_bytes(identity));
            write_dict_entry(w, "id", &(layer_id as i32).to_le_bytes());
            write_dict_entry(w, "visible", &[u8::from(node.visible())]);
            Ok(())
        })?;
    }
    Ok(w.into_inner())
}
