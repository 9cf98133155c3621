//! Qubicle project `.qbcl`: a header with a thumbnail and metadata strings, followed by a
//! node tree like `.qbt`'s. Matrix voxels are run-length encoded per column, then
//! zlib-compressed.

use std::mem;

use itertools::Itertools as _;

use voxfmt::math::{GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{NodeId, Palette, PaletteLookup, RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::util::{
    check_save_size, deflate, flatten_onto, inflate, relative_position, volume_from_size,
    world_lower,
};
use crate::{FormatError, LoadOptions};


const MAGIC: &str = "QBCL";
const PROGRAM_VERSION: u32 = 131331;
const FILE_VERSION: u32 = 2;
const NODE_MATRIX: u32 = 0;
const NODE_MODEL: u32 = 1;
const NODE_COMPOUND: u32 = 2;
/// Mask byte of an entry whose red byte is a run length; the color follows.
const RLE_FLAG: u8 = 2;
const MAX_CHILDREN: u32 = 2048;
const MAX_MATRIX_SIZE: u32 = 2048;
const MAX_VOXEL_DATA: u32 = 0xFF_FFFF;
const MAX_DEPTH: usize = 64;
/// Root node properties, in the order the header stores them.
const METADATA_KEYS: [&str; 7] = [
    "title",
    "description",
    "metadata",
    "author",
    "company",
    "website",
    "copyright",
];

fn read_header(r: &mut ByteReader<'_>) -> Result<Vec<(&'static str, String)>, FormatError> {
    FormatError::check_magic(MAGIC, r.read_bytes(4)?)?;
    let program_version = r.read_u32_le()?;
    let file_version = r.read_u32_le()?;
    if file_version != FILE_VERSION {
        return Err(FormatError::UnsupportedVersion {
            what: "qbcl file",
            version: file_version,
        });
    }
    let thumb_width = r.read_u32_le()?;
    let thumb_height = r.read_u32_le()?;
    log::debug!(
        "qbcl program version {program_version}, thumbnail {thumb_width}x{thumb_height}"
    );
    let thumb_len = u64::from(thumb_width) * u64::from(thumb_height) * 4;
    r.skip(usize::try_from(thumb_len).unwrap_or(usize::MAX))?;

    let metadata = METADATA_KEYS
        .into_iter()
        .map(|key| Ok((key, r.read_pascal_string_u32_le()?)))
        .collect::<Result<Vec<_>, FormatError>>()?;
    let _timestamps = [r.read_u64_le()?, r.read_u64_le()?];
    Ok(metadata)
}

/// Fields common to every node.
struct NodeHeader {
    node_type: u32,
    name: String,
    visible: bool,
    locked: bool,
}

fn read_node_header(r: &mut ByteReader<'_>) -> Result<NodeHeader, FormatError> {
    let node_type = r.read_u32_le()?;
    let _unknown = r.read_u32_le()?;
    let name = r.read_pascal_string_u32_le()?;
    let [visible, _unknown, locked] = r.read_array()?;
    Ok(NodeHeader {
        node_type,
        name,
        visible: visible != 0,
        locked: locked != 0,
    })
}

impl NodeHeader {
    fn apply(&self, node: SceneNode, default_name: &str) -> SceneNode {
        let mut node = node.with_visible(self.visible);
        node.set_name(if self.name.is_empty() {
            default_name
        } else {
            &self.name
        });
        if self.locked {
            node.set_property("locked", "true");
        }
        node
    }
}

struct Loader<'o> {
    options: &'o LoadOptions,
    lookup: PaletteLookup,
    graph: SceneGraph,
}

impl Loader<'_> {
    /// `parent` is [`None`] for the outermost node, whose model node stands for the root.
    fn read_node(
        &mut self,
        r: &mut ByteReader<'_>,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Result<(), FormatError> {
        if depth > MAX_DEPTH {
            return Err(FormatError::malformed("qbcl node tree is nested too deeply"));
        }
        let header = read_node_header(r)?;
        let attach_to = parent.unwrap_or(SceneGraph::ROOT);
        match header.node_type {
            NODE_MATRIX => {
                let node = self.read_matrix(r)?;
                self.graph.add(header.apply(node, "Matrix"), attach_to)?;
            }
            NODE_MODEL => {
                // rotation matrix, unused
                r.skip(9 * 4)?;
                let child_count = read_child_count(r)?;
                let id = match parent {
                    None => SceneGraph::ROOT,
                    Some(parent) => self
                        .graph
                        .add(header.apply(SceneNode::group(""), "Model"), parent)?,
                };
                for _ in 0..child_count {
                    self.read_node(r, Some(id), depth + 1)?;
                }
            }
            NODE_COMPOUND => {
                let mut node = header.apply(self.read_matrix(r)?, "Compound");
                let child_count = read_child_count(r)?;
                if self.options.merge_compounds {
                    let outer = mem::take(&mut self.graph);
                    let result = (0..child_count)
                        .try_for_each(|_| self.read_node(r, Some(SceneGraph::ROOT), depth + 1));
                    let children = mem::replace(&mut self.graph, outer);
                    result?;
                    if let Some(volume) = node.volume_mut() {
                        *volume = flatten_onto(volume, &children)?;
                    }
                    self.graph.add(node, attach_to)?;
                } else {
                    let id = self.graph.add(node, attach_to)?;
                    for _ in 0..child_count {
                        self.read_node(r, Some(id), depth + 1)?;
                    }
                }
            }
            other => {
                return Err(FormatError::malformed(format!(
                    "unknown qbcl node type {other} for {:?}",
                    header.name
                )));
            }
        }
        Ok(())
    }

    fn read_matrix(&mut self, r: &mut ByteReader<'_>) -> Result<SceneNode, FormatError> {
        let size = [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?];
        let translation = GridVector::new(r.read_i32_le()?, r.read_i32_le()?, r.read_i32_le()?);
        let pivot = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
        let data_len = r.read_u32_le()?;
        log::debug!("qbcl matrix: size {size:?}, translation {translation:?}, {data_len} bytes");
        if data_len == 0 {
            return Err(FormatError::malformed("qbcl matrix has no voxel data"));
        }
        FormatError::check_limit("qbcl voxel data size", data_len, MAX_VOXEL_DATA)?;
        let mut volume = volume_from_size("qbcl matrix", size, MAX_MATRIX_SIZE)?;
        let compressed = r.read_bytes(data_len as usize)?;

        let [sx, sy, sz] = size.map(|s| s as usize);
        // every entry a single voxel, plus the entry counts
        let max_len = sx * sz * (2 + sy * 4);
        let data = inflate(compressed, max_len)?;
        let data = &mut ByteReader::new(&data);
        let mut column = 0;
        while !data.is_eof() {
            let x = (column / sz) as i32;
            let z = (column % sz) as i32;
            let mut y = 0i32;
            let entries = data.read_u16_le()?;
            let mut i = 0;
            while i < entries {
                let [red, green, blue, mask] = data.read_array()?;
                if mask == RLE_FLAG {
                    let run = i32::from(red);
                    let [red, green, blue, alpha] = data.read_array()?;
                    if alpha != 0 {
                        let voxel = Voxel::Generic(self.lookup.get_or_add(Rgba::rgb(red, green, blue)));
                        for dy in 0..run {
                            volume.set_voxel([x, y + dy, z], voxel);
                        }
                    }
                    y += run;
                    // the color is counted as an entry of its own
                    i += 1;
                } else if mask != 0 {
                    let voxel = Voxel::Generic(self.lookup.get_or_add(Rgba::rgb(red, green, blue)));
                    volume.set_voxel([x, y, z], voxel);
                    y += 1;
                } else {
                    y += 1;
                }
                i += 1;
            }
            column += 1;
        }

        let pivot = GridVector::from(pivot.map(|p| p.round() as i32));
        Ok(SceneNode::model("", volume).with_transform(Transform { translation, pivot }))
    }
}

fn read_child_count(r: &mut ByteReader<'_>) -> Result<u32, FormatError> {
    let count = r.read_u32_le()?;
    FormatError::check_limit("qbcl child count", count, MAX_CHILDREN)?;
    Ok(count)
}

pub(crate) fn load(bytes: &[u8], options: &LoadOptions) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let metadata = read_header(r)?;
    let mut loader = Loader {
        options,
        lookup: PaletteLookup::default(),
        graph: SceneGraph::new(),
    };
    loader.read_node(r, None, 0)?;

    let Loader { lookup, mut graph, .. } = loader;
    let palette = lookup.into_palette();
    let model_ids: Vec<NodeId> = graph.model_nodes().map(|(id, _)| id).collect();
    for id in model_ids {
        if let Some(node) = graph.node_mut(id) {
            node.set_palette(palette.clone());
        }
    }
    if let Some(root) = graph.node_mut(SceneGraph::ROOT) {
        for (key, value) in metadata {
            if !value.is_empty() {
                root.set_property(key, value);
            }
        }
    }
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

/// Writes the fields common to every node.
fn write_node_header(
    w: &mut ByteWriter,
    node_type: u32,
    node: &SceneNode,
) -> Result<(), FormatError> {
    w.write_u32_le(node_type);
    w.write_u32_le(1);
    w.write_pascal_string_u32_le(node.name())?;
    w.write_u8(node.visible().into());
    w.write_u8(1);
    w.write_u8((node.property("locked") == Some("true")).into());
    Ok(())
}

/// Encodes one run of equal voxels, returning the number of entries it counts as.
fn write_run(out: &mut ByteWriter, color: [u8; 4], count: usize) -> u16 {
    if count > 2 {
        out.write_bytes(&[count as u8, 0, 0, RLE_FLAG]);
        out.write_bytes(&color);
        2
    } else {
        for _ in 0..count {
            out.write_bytes(&color);
        }
        count as u16
    }
}

fn encode_voxels(volume: &RawVolume, palette: &Palette) -> Vec<u8> {
    let region = volume.region();
    let size = region.size();
    let lower = region.lower();
    let mut out = ByteWriter::new();
    for x in 0..size.width as i32 {
        for z in 0..size.depth as i32 {
            let column = (0..size.height as i32).map(|y| {
                match volume.voxel(lower + GridVector::new(x, y, z)) {
                    Voxel::Air => [0; 4],
                    Voxel::Generic(index) => {
                        let color = palette.color(index);
                        [color.r(), color.g(), color.b(), if color.a() > 0 { 255 } else { 0 }]
                    }
                }
            });
            let mut encoded = ByteWriter::new();
            let mut entries: u16 = 0;
            for (count, color) in column.dedup_with_count() {
                let mut remaining = count;
                while remaining > 0 {
                    let run = remaining.min(255);
                    entries = entries.saturating_add(write_run(&mut encoded, color, run));
                    remaining -= run;
                }
            }
            out.write_u16_le(entries);
            out.write_bytes(encoded.as_slice());
        }
    }
    out.into_inner()
}

struct Saver<'g> {
    graph: &'g SceneGraph,
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
    /// matrix, which written translations are relative to.
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
        let Some(volume) = node.volume() else {
            write_node_header(w, NODE_MODEL, node)?;
            for (col, row) in (0..3).cartesian_product(0..3) {
                w.write_f32_le(if col == row { 1.0 } else { 0.0 });
            }
            w.write_u32_le(children.len() as u32);
            return children
                .iter()
                .try_for_each(|&child| self.write_node(w, child, origin));
        };

        let world_lower = world_lower(self.graph, id)?;
        let node_type = if children.is_empty() {
            NODE_MATRIX
        } else {
            NODE_COMPOUND
        };
        write_node_header(w, node_type, node)?;
        self.write_matrix(w, id, node, volume, relative_position(world_lower, origin)?)?;
        if node_type == NODE_COMPOUND {
            w.write_u32_le(children.len() as u32);
            for &child in &children {
                self.write_node(w, child, world_lower)?;
            }
        }
        Ok(())
    }

    fn write_matrix(
        &self,
        w: &mut ByteWriter,
        id: NodeId,
        node: &SceneNode,
        volume: &RawVolume,
        translation: GridVector,
    ) -> Result<(), FormatError> {
        let region = volume.region();
        check_save_size("qbcl matrix size", region, MAX_MATRIX_SIZE)?;
        for s in region.size().to_array() {
            w.write_u32_le(s);
        }
        for t in translation.to_array() {
            w.write_i32_le(t);
        }
        let pivot = node.transform().pivot;
        for (p, l) in pivot.to_array().into_iter().zip(region.lower().to_array()) {
            w.write_f32_le(p as f32 - l as f32);
        }
        let compressed = deflate(&encode_voxels(volume, &self.graph.resolved_palette(id)))?;
        FormatError::check_limit("qbcl voxel data size", compressed.len() as u64, MAX_VOXEL_DATA)?;
        w.write_u32_le(compressed.len() as u32);
        w.write_bytes(&compressed);
        Ok(())
    }
}

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let mut w = ByteWriter::new();
    w.write_bytes(MAGIC.as_bytes());
    w.write_u32_le(PROGRAM_VERSION);
    w.write_u32_le(FILE_VERSION);
    // no thumbnail
    w.write_u32_le(0);
    w.write_u32_le(0);
    let root = graph.root();
    for key in METADATA_KEYS {
        w.write_pascal_string_u32_le(root.property(key).unwrap_or(""))?;
    }
    w.write_u64_le(0);
    w.write_u64_le(0);
    Saver { graph }.write_node(&mut w, SceneGraph::ROOT, GridVector::zero())?;
    Ok(w.into_inner())
}
