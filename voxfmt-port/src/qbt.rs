//! Qubicle Binary Tree `.qbt`: an optional color map followed by a tree of matrix, model
//! and compound nodes. Matrix voxels are zlib-compressed.

use std::collections::HashMap;
use std::mem;

use voxfmt::math::{GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{NodeId, Palette, PaletteLookup, RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::util::{
    check_save_size, deflate, flatten_onto, inflate, relative_position, volume_from_size,
    world_lower,
};
use crate::{FormatError, LoadOptions};

#[cfg(test)]
mod tests;

const MAGIC: &str = "QB 2";
const NODE_MATRIX: u32 = 0;
const NODE_MODEL: u32 = 1;
const NODE_COMPOUND: u32 = 2;
const MAX_CHILDREN: u32 = 2048;
const MAX_MATRIX_SIZE: u32 = 2048;
const MAX_VOXEL_DATA: u32 = 0xFF_FFFF;
/// Deeper trees are rejected rather than recursed into.
const MAX_DEPTH: usize = 64;

fn read_header(r: &mut ByteReader<'_>) -> Result<(), FormatError> {
    FormatError::check_magic(MAGIC, r.read_bytes(4)?)?;
    let major = r.read_u8()?;
    let minor = r.read_u8()?;
    if major != 1 {
        return Err(FormatError::UnsupportedVersion {
            what: "qbt",
            version: major.into(),
        });
    }
    let scale = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
    log::debug!("qbt version {major}.{minor}, global scale {scale:?}");
    Ok(())
}

fn unknown_section(caption: &[u8]) -> FormatError {
    FormatError::malformed(format!("unknown qbt section {:?}", caption.escape_ascii().to_string()))
}

/// Reads the body of a `COLORMAP` section. An empty color map means voxels carry their
/// own colors.
fn read_color_map(r: &mut ByteReader<'_>) -> Result<Option<Palette>, FormatError> {
    let count = r.read_u32_le()?;
    if count == 0 {
        return Ok(None);
    }
    FormatError::check_limit("qbt color map size", count, 256u32)?;
    let colors = (0..count)
        .map(|_| {
            let [red, green, blue, _mask] = r.read_array()?;
            Ok(Rgba::rgb(red, green, blue))
        })
        .collect::<Result<Vec<Rgba>, FormatError>>()?;
    Ok(Some(Palette::from_colors(colors)?))
}

/// How matrix voxel bytes are interpreted.
enum Colors {
    /// The red byte is an index into the color map.
    Indexed(Palette),
    /// Each voxel stores its own color.
    True(PaletteLookup),
}

impl Colors {
    fn voxel(&mut self, [red, green, blue, mask]: [u8; 4]) -> Voxel {
        if mask == 0 {
            return Voxel::Air;
        }
        match self {
            Colors::Indexed(_) => Voxel::Generic(red),
            Colors::True(lookup) => Voxel::Generic(lookup.get_or_add(Rgba::rgb(red, green, blue))),
        }
    }

    fn into_palette(self) -> Palette {
        match self {
            Colors::Indexed(palette) => palette,
            Colors::True(lookup) => lookup.into_palette(),
        }
    }
}

struct Loader<'o> {
    options: &'o LoadOptions,
    colors: Colors,
    graph: SceneGraph,
}

impl Loader<'_> {
    fn read_node(
        &mut self,
        r: &mut ByteReader<'_>,
        parent: NodeId,
        depth: usize,
    ) -> Result<(), FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::malformed("qbt node tree is nested too deeply"));
        }
        let node_type = r.read_u32_le()?;
        let data_size = r.read_u32_le()?;
        match node_type {
            NODE_MATRIX => {
                let node = self.read_matrix(r)?;
                self.graph.add(node, parent)?;
            }
            NODE_MODEL => {
                let child_count = read_child_count(r)?;
                let id = self.graph.add(SceneNode::group("Model"), parent)?;
                for _ in 0..child_count {
                    self.read_node(r, id, depth + 1)?;
                }
            }
            NODE_COMPOUND => {
                let mut node = self.read_matrix(r)?;
                let child_count = read_child_count(r)?;
                if self.options.merge_compounds {
                    let children = self.read_detached(r, child_count, depth)?;
                    if let Some(volume) = node.volume_mut() {
                        *volume = flatten_onto(volume, &children)?;
                    }
                    self.graph.add(node, parent)?;
                } else {
                    let id = self.graph.add(node, parent)?;
                    for _ in 0..child_count {
                        self.read_node(r, id, depth + 1)?;
                    }
                }
            }
            other => {
                log::warn!("skipping unknown qbt node type {other} of {data_size} bytes");
                r.skip(data_size as usize)?;
            }
        }
        Ok(())
    }

    /// Reads `count` sibling nodes into a graph of their own.
    fn read_detached(
        &mut self,
        r: &mut ByteReader<'_>,
        count: u32,
        depth: usize,
    ) -> Result<SceneGraph, FormatError> {
        let outer = mem::take(&mut self.graph);
        let result = (0..count).try_for_each(|_| self.read_node(r, SceneGraph::ROOT, depth + 1));
        let detached = mem::replace(&mut self.graph, outer);
        result.map(|()| detached)
    }

    fn read_matrix(&mut self, r: &mut ByteReader<'_>) -> Result<SceneNode, FormatError> {
        let name = r.read_pascal_string_u32_le()?;
        let position = GridVector::new(r.read_i32_le()?, r.read_i32_le()?, r.read_i32_le()?);
        let local_scale = [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?];
        let pivot = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
        let size = [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?];
        let data_len = r.read_u32_le()?;
        log::debug!(
            "qbt matrix {name:?}: position {position:?}, scale {local_scale:?}, \
            pivot {pivot:?}, size {size:?}"
        );
        if data_len == 0 {
            return Err(FormatError::malformed(format!("matrix {name:?} has no voxel data")));
        }
        FormatError::check_limit("qbt voxel data size", data_len, MAX_VOXEL_DATA)?;
        let mut volume = volume_from_size("qbt matrix", size, MAX_MATRIX_SIZE)?;
        let compressed = r.read_bytes(data_len as usize)?;

        let [sx, sy, sz] = size.map(|s| s as i32);
        let expected_len = sx as usize * sy as usize * sz as usize * 4;
        let data = inflate(compressed, expected_len)?;
        let data = &mut ByteReader::new(&data);
        for x in 0..sx {
            for z in 0..sz {
                for y in 0..sy {
                    let voxel = self.colors.voxel(data.read_array()?);
                    volume.set_voxel([x, y, z], voxel);
                }
            }
        }

        let pivot = GridVector::from(pivot.map(|p| p.round() as i32));
        Ok(SceneNode::model(name, volume).with_transform(Transform {
            translation: position,
            pivot,
        }))
    }
}

fn read_child_count(r: &mut ByteReader<'_>) -> Result<u32, FormatError> {
    let count = r.read_u32_le()?;
    FormatError::check_limit("qbt child count", count, MAX_CHILDREN)?;
    Ok(count)
}

pub(crate) fn load(bytes: &[u8], options: &LoadOptions) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    read_header(r)?;
    let mut loader = Loader {
        options,
        colors: Colors::True(PaletteLookup::default()),
        graph: SceneGraph::new(),
    };
    while !r.is_eof() {
        let caption: [u8; 8] = r.read_array()?;
        match &caption {
            b"COLORMAP" => {
                if let Some(palette) = read_color_map(r)? {
                    loader.colors = Colors::Indexed(palette);
                }
            }
            b"DATATREE" => loader.read_node(r, SceneGraph::ROOT, 0)?,
            _ => return Err(unknown_section(&caption)),
        }
    }

    let Loader { colors, mut graph, .. } = loader;
    let palette = colors.into_palette();
    let model_ids: Vec<NodeId> = graph.model_nodes().map(|(id, _)| id).collect();
    for id in model_ids {
        if let Some(node) = graph.node_mut(id) {
            node.set_palette(palette.clone());
        }
    }
    Ok(graph)
}

/// Returns the color map, or the colors of the voxels if the file has none.
pub(crate) fn load_palette(bytes: &[u8]) -> Result<Palette, FormatError> {
    let r = &mut ByteReader::new(bytes);
    read_header(r)?;
    while !r.is_eof() {
        let caption: [u8; 8] = r.read_array()?;
        match &caption {
            b"COLORMAP" => {
                if let Some(palette) = read_color_map(r)? {
                    return Ok(palette);
                }
            }
            b"DATATREE" => break,
            _ => return Err(unknown_section(&caption)),
        }
    }
    let graph = load(bytes, &LoadOptions::default())?;
    let (id, _) = graph.model_nodes().next().ok_or(FormatError::EmptyScene)?;
    Ok(graph.resolved_palette(id))
}

// -------------------------------------------------------------------------------------------------

struct Saver<'g> {
    graph: &'g SceneGraph,
    palette: Palette,
    volumes: HashMap<NodeId, RawVolume>,
}

impl Saver<'_> {
    fn children(&self, node: &SceneNode) -> Vec<NodeId> {
        node.children()
            .iter()
            .copied()
            .filter(|&id| self.graph.node(id).is_some())
            .collect()
    }

    /// `origin` is the world position of the lower corner of the nearest enclosing
    /// matrix, which written positions are relative to.
    fn write_node(
        &self,
        w: &mut ByteWriter,
        id: NodeId,
        origin: GridVector,
    ) -> Result<(), FormatError> {
        let Some(node) = self.graph.node(id) else {
            return Ok(());
        };
        let children = self.children(node);
        let Some(volume) = self.volumes.get(&id) else {
            // Groups carry no position, so a lone child can stand in for its group.
            if let [only] = children[..] {
                return self.write_node(w, only, origin);
            }
            return write_framed(w, NODE_MODEL, |w| {
                w.write_u32_le(children.len() as u32);
                children.iter().try_for_each(|&child| self.write_node(w, child, origin))
            });
        };

        let world_lower = world_lower(self.graph, id)?;
        let position = relative_position(world_lower, origin)?;
        if children.is_empty() {
            write_framed(w, NODE_MATRIX, |w| self.write_matrix(w, node, volume, position))
        } else {
            write_framed(w, NODE_COMPOUND, |w| {
                self.write_matrix(w, node, volume, position)?;
                w.write_u32_le(children.len() as u32);
                children.iter().try_for_each(|&child| self.write_node(w, child, world_lower))
            })
        }
    }

    fn write_matrix(
        &self,
        w: &mut ByteWriter,
        node: &SceneNode,
        volume: &RawVolume,
        position: GridVector,
    ) -> Result<(), FormatError> {
        let region = volume.region();
        check_save_size("qbt matrix size", region, MAX_MATRIX_SIZE)?;
        w.write_pascal_string_u32_le(node.name())?;
        for p in position.to_array() {
            w.write_i32_le(p);
        }
        for _ in 0..3 {
            w.write_u32_le(1);
        }
        let pivot = node.transform().pivot;
        for (p, l) in pivot.to_array().into_iter().zip(region.lower().to_array()) {
            w.write_f32_le(p as f32 - l as f32);
        }
        let size = region.size();
        for s in size.to_array() {
            w.write_u32_le(s);
        }

        let indexed = !self.palette.is_empty();
        let lower = region.lower();
        let mut raw = Vec::with_capacity(volume.region().volume().unwrap_or(0) * 4);
        for x in 0..size.width as i32 {
            for z in 0..size.depth as i32 {
                for y in 0..size.height as i32 {
                    let bytes = match volume.voxel(lower + GridVector::new(x, y, z)) {
                        Voxel::Air => [0; 4],
                        Voxel::Generic(index) if indexed => [index, 0, 0, 255],
                        Voxel::Generic(index) => {
                            let color = self.palette.color(index);
                            [color.r(), color.g(), color.b(), 255]
                        }
                    };
                    raw.extend_from_slice(&bytes);
                }
            }
        }
        let compressed = deflate(&raw)?;
        FormatError::check_limit("qbt voxel data size", compressed.len() as u64, MAX_VOXEL_DATA)?;
        w.write_u32_le(compressed.len() as u32);
        w.write_bytes(&compressed);
        Ok(())
    }
}

/// Writes a node type and a size field covering whatever `body` writes.
fn write_framed(
    w: &mut ByteWriter,
    node_type: u32,
    body: impl FnOnce(&mut ByteWriter) -> Result<(), FormatError>,
) -> Result<(), FormatError> {
    w.write_u32_le(node_type);
    let size = w.reserve_u32_le();
    body(w)?;
    w.patch_size_since(size)?;
    Ok(())
}

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let (palette, volumes) = graph.models_with_shared_palette();
    let saver = Saver {
        graph,
        palette,
        volumes: volumes.into_iter().collect(),
    };

    let mut w = ByteWriter::new();
    w.write_bytes(MAGIC.as_bytes());
    w.write_u8(1);
    w.write_u8(0);
    for _ in 0..3 {
        w.write_f32_le(1.0);
    }
    w.write_bytes(b"COLORMAP");
    w.write_u32_le(saver.palette.color_count() as u32);
    for color in saver.palette.colors() {
        w.write_bytes(&[color.r(), color.g(), color.b(), 255]);
    }
    w.write_bytes(b"DATATREE");
    saver.write_node(&mut w, SceneGraph::ROOT, GridVector::zero())?;
    Ok(w.into_inner())
}
