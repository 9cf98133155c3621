//! Sandbox VoxEdit rigs (`.vxr`), versions 1 (`VXR1`) to 9 (`VXR9`).
//!
//! A rig is a node hierarchy whose models live in separate [`.vxm`](crate::Format::Vxm)
//! files beside it. Versions up to 3 carry keyframes inline and list the model files after
//! the hierarchy; later versions name the model file in each node and keep animations in
//! `.vxa` files, which are not read.

use std::io;

use voxfmt::math::GridVector;
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{NodeId, SceneGraph, SceneNode, Transform};

use crate::util::truncated_name;
use crate::{FormatError, vxm};


const MAGIC: &str = "VXR";
const MIN_VERSION: u32 = 1;
const MAX_VERSION: u32 = 9;
/// The version written by [`save()`].
const SAVE_VERSION: u32 = 9;
const MAX_NAME_LEN: usize = 1024;
const MAX_CHILDREN: u32 = 2048;
const MAX_DEPTH: usize = 64;
const MAX_KEYFRAMES: u32 = 0x10000;
const MAX_LODS: u32 = 16;
const MAX_QUADS: u32 = 0x40000;
const MAX_IK_CONSTRAINTS: u32 = 1024;
/// Bytes per quad of a static mesh: four vertices of five floats.
const QUAD_LEN: usize = 4 * 5 * 4;
/// Name of the node VoxEdit expects at the top of every rig.
const CONTROLLER_NODE: &str = "Controller";
const DEFAULT_ANIMATION: &str = "Idle";

/// Node properties stored as one byte each, in file order, after the color of version 6+.
const MIRROR_FLAGS: [&str; 7] = [
    "mirror x axis",
    "mirror y axis",
    "mirror z axis",
    "preview mirror x axis",
    "preview mirror y axis",
    "preview mirror z axis",
    "ikAnchor",
];

fn parse_version(magic: [u8; 4]) -> Result<u32, FormatError> {
    FormatError::check_magic(MAGIC, &magic[..3])?;
    let version = match magic[3] {
        c @ b'0'..=b'9' => u32::from(c - b'0'),
        other => u32::from(other),
    };
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            what: "vxr",
            version,
        });
    }
    Ok(version)
}

fn read_name(r: &mut ByteReader<'_>) -> Result<String, FormatError> {
    Ok(r.read_cstring(MAX_NAME_LEN)?)
}

fn read_bool(r: &mut ByteReader<'_>) -> Result<bool, FormatError> {
    Ok(r.read_u8()? != 0)
}

/// Reads a signed count, which must not be negative or exceed `max`.
fn read_count(r: &mut ByteReader<'_>, what: &'static str, max: u32) -> Result<u32, FormatError> {
    let count = r.read_i32_le()?;
    let count = u32::try_from(count)
        .map_err(|_| FormatError::malformed(format!("{what} is negative: {count}")))?;
    FormatError::check_limit(what, count, max)?;
    Ok(count)
}

/// One node of the rig as stored, before its model file is resolved.
#[derive(Debug, Default)]
struct RigNode {
    name: String,
    model_file: String,
    translation: GridVector,
    visible: bool,
    properties: Vec<(&'static str, String)>,
    children: Vec<RigNode>,
}

impl RigNode {
    fn new(name: String) -> Self {
        Self {
            name,
            visible: true,
            ..Self::default()
        }
    }

    /// Depth-first search by name.
    fn find_mut(&mut self, name: &str) -> Option<&mut RigNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(name))
    }
}

fn check_depth(depth: usize) -> Result<(), FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::malformed("vxr node tree is nested too deeply"));
    }
    Ok(())
}

// -------------------------------------------------------------------------------------------------

/// Reads a node of version 1 to 3, whose first keyframe gives its translation.
fn read_keyframed_node(
    r: &mut ByteReader<'_>,
    version: u32,
    depth: usize,
) -> Result<RigNode, FormatError> {
    check_depth(depth)?;
    let mut node = RigNode::new(read_name(r)?);
    let _animation_count = r.read_u32_le()?;
    node.properties.push(("animationid", read_name(r)?));
    let keyframe_count = read_count(r, "vxr keyframe count", MAX_KEYFRAMES)?;
    for keyframe in 0..keyframe_count {
        let _frame = r.read_i32_le()?;
        let _interpolation = r.read_i32_le()?;
        if version > 1 {
            let _long_rotation = read_bool(r)?;
        }
        let [x, y, z] = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
        if keyframe == 0 {
            // x is mirrored
            let [x, y, z] = [-x, y, z].map(|c| c.round() as i32);
            node.translation = GridVector::new(x, y, z);
        }
        if version >= 3 {
            r.skip(3 * 4)?;
        }
        // Euler angles in version 1, quaternions after; then the scale
        r.skip(if version == 1 { 6 * 4 } else { 8 * 4 })?;
        r.skip(if version >= 3 { 2 * 4 } else { 4 })?;
    }
    let child_count = read_count(r, "vxr child count", MAX_CHILDREN)?;
    for _ in 0..child_count {
        node.children.push(read_keyframed_node(r, version, depth + 1)?);
    }
    Ok(node)
}

fn read_keyframed_rig(r: &mut ByteReader<'_>, version: u32) -> Result<Vec<RigNode>, FormatError> {
    let _node_and_model_count = r.read_u32_le()?;
    let child_count = r.read_u32_le()?;
    FormatError::check_limit("vxr child count", child_count, MAX_CHILDREN)?;
    let mut nodes = (0..child_count)
        .map(|_| read_keyframed_node(r, version, 0))
        .collect::<Result<Vec<_>, _>>()?;

    let model_count = read_count(r, "vxr model count", MAX_CHILDREN)?;
    for _ in 0..model_count {
        let name = read_name(r)?;
        let model_file = read_name(r)?;
        let node = nodes
            .iter_mut()
            .find_map(|node| node.find_mut(&name))
            .ok_or_else(|| FormatError::malformed(format!("vxr model for unknown node {name:?}")))?;
        node.model_file = model_file;
    }
    Ok(nodes)
}

/// Skips the prebaked meshes of a static rig.
fn skip_static_meshes(r: &mut ByteReader<'_>) -> Result<(), FormatError> {
    let lod_count = read_count(r, "vxr level of detail count", MAX_LODS)?;
    for _ in 0..lod_count {
        r.skip(2 * 4)?;
        let diffuse_len = r.read_u32_le()?;
        r.skip(diffuse_len as usize)?;
        if read_bool(r)? {
            let emissive_len = r.read_u32_le()?;
            r.skip(emissive_len as usize)?;
        }
        let quad_count = read_count(r, "vxr quad count", MAX_QUADS)?;
        r.skip(quad_count as usize * QUAD_LEN)?;
    }
    Ok(())
}

/// Reads a node of version 4 or later.
fn read_node(r: &mut ByteReader<'_>, version: u32, depth: usize) -> Result<RigNode, FormatError> {
    check_depth(depth)?;
    let mut node = RigNode::new(read_name(r)?);
    node.model_file = read_name(r)?;
    node.properties.push(("id", node.name.clone()));
    node.properties.push(("filename", node.model_file.clone()));
    let flag = |value: bool| value.to_string();

    if version > 4 {
        if version >= 9 {
            node.properties.push(("collidable", flag(read_bool(r)?)));
            node.properties.push(("decorative", flag(read_bool(r)?)));
        }
        if version >= 6 {
            node.properties.push(("color", r.read_u32_le()?.to_string()));
            node.properties.push(("favorite", flag(read_bool(r)?)));
            node.visible = read_bool(r)?;
        }
        for key in MIRROR_FLAGS {
            node.properties.push((key, flag(read_bool(r)?)));
        }
        if version >= 9 {
            node.properties.push(("ikEffectorId", read_name(r)?));
            node.properties.push(("ikConstraintsVisible", flag(read_bool(r)?)));
            node.properties.push(("ikRollMin", r.read_f32_le()?.to_string()));
            node.properties.push(("ikRollMax", r.read_f32_le()?.to_string()));
            let constraints = read_count(r, "vxr constraint count", MAX_IK_CONSTRAINTS)?;
            r.skip(constraints as usize * 3 * 4)?;
        } else {
            node.properties.push(("pitch constraint", flag(read_bool(r)?)));
            node.properties.push(("pitch constraint min", r.read_f32_le()?.to_string()));
            node.properties.push(("pitch constraint max", r.read_f32_le()?.to_string()));
            // which rotation directions are allowed
            r.skip(4)?;
        }
    }

    let child_count = read_count(r, "vxr child count", MAX_CHILDREN)?;
    for _ in 0..child_count {
        node.children.push(read_node(r, version, depth + 1)?);
    }
    Ok(node)
}

fn read_rig(
    r: &mut ByteReader<'_>,
    version: u32,
    root_properties: &mut Vec<(&'static str, String)>,
) -> Result<Vec<RigNode>, FormatError> {
    if version >= 7 {
        root_properties.push(("defaultanim", read_name(r)?));
    }
    let child_count = read_count(r, "vxr child count", MAX_CHILDREN)?;
    if version >= 8 {
        root_properties.push(("basetemplate", read_name(r)?));
        let is_static = read_bool(r)?;
        root_properties.push(("static", is_static.to_string()));
        if is_static {
            skip_static_meshes(r)?;
        }
    }
    (0..child_count).map(|_| read_node(r, version, 0)).collect()
}

/// Turns `rig` into a scene node, loading its model file through `read_model`.
///
/// A model file which cannot be read or decoded leaves a group node in place of the model.
fn scene_node<F>(rig: &RigNode, read_model: &mut F) -> SceneNode
where
    F: FnMut(&str) -> io::Result<Vec<u8>>,
{
    let model = if rig.model_file.is_empty() {
        None
    } else {
        match read_model(&rig.model_file) {
            Ok(bytes) => match vxm::load(&bytes) {
                Ok(graph) => {
                    let model = graph.model_nodes().next().and_then(|(id, node)| {
                        Some((node.volume()?.clone(), graph.resolved_palette(id), node.transform()))
                    });
                    if model.is_none() {
                        log::warn!("vxr model file {:?} holds no model", rig.model_file);
                    }
                    model
                }
                Err(error) => {
                    log::warn!("could not decode vxr model {:?}: {error}", rig.model_file);
                    None
                }
            },
            Err(error) => {
                log::warn!(
                    "could not read model {:?} of vxr node {:?}: {error}",
                    rig.model_file,
                    rig.name
                );
                None
            }
        }
    };

    let mut node = match model {
        Some((volume, palette, transform)) => SceneNode::model(&rig.name, volume)
            .with_palette(palette)
            .with_transform(Transform {
                translation: rig.translation,
                pivot: transform.pivot,
            }),
        None => SceneNode::group(&rig.name)
            .with_transform(Transform::from_translation(rig.translation)),
    };
    node.set_visible(rig.visible);
    for (key, value) in &rig.properties {
        node.set_property(*key, value.as_str());
    }
    node
}

fn add_nodes<F>(
    graph: &mut SceneGraph,
    parent: NodeId,
    nodes: &[RigNode],
    read_model: &mut F,
) -> Result<(), FormatError>
where
    F: FnMut(&str) -> io::Result<Vec<u8>>,
{
    for rig in nodes {
        let id = graph.add(scene_node(rig, read_model), parent)?;
        add_nodes(graph, id, &rig.children, read_model)?;
    }
    Ok(())
}

/// Decodes a rig, reading the model files it names through `read_model`.
pub(crate) fn load<F>(bytes: &[u8], mut read_model: F) -> Result<SceneGraph, FormatError>
where
    F: FnMut(&str) -> io::Result<Vec<u8>>,
{
    let r = &mut ByteReader::new(bytes);
    let version = parse_version(r.read_array()?)?;
    log::debug!("vxr version {version}");

    let mut root_properties = vec![("vxrversion", version.to_string())];
    let nodes = if version <= 3 {
        read_keyframed_rig(r, version)?
    } else {
        read_rig(r, version, &mut root_properties)?
    };
    let mut graph = SceneGraph::new();
    if let Some(root) = graph.node_mut(SceneGraph::ROOT) {
        for (key, value) in root_properties {
            root.set_property(key, value);
        }
    }
    add_nodes(&mut graph, SceneGraph::ROOT, &nodes, &mut read_model)?;
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

/// A rig as written by [`save()`]: its own bytes, and each model file it names.
#[derive(Debug)]
pub(crate) struct SavedRig {
    pub(crate) bytes: Vec<u8>,
    pub(crate) models: Vec<(String, Vec<u8>)>,
}

struct Saver<'g> {
    graph: &'g SceneGraph,
    stem: &'g str,
    models: Vec<(String, Vec<u8>)>,
}

/// Keeps model file names to one path component.
fn file_name_part(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

fn write_child_count(w: &mut ByteWriter, count: usize) -> Result<(), FormatError> {
    let count = i32::try_from(count)
        .map_err(|_| FormatError::Unsupported(format!("vxr node with {count} children")))?;
    w.write_i32_le(count);
    Ok(())
}

fn write_flag(w: &mut ByteWriter, node: Option<&SceneNode>, key: &str, default: bool) {
    let value = node.and_then(|n| n.property(key)).map_or(default, |v| v == "true");
    w.write_u8(u8::from(value));
}

fn write_float(w: &mut ByteWriter, node: Option<&SceneNode>, key: &str, default: f32) {
    let value = node
        .and_then(|n| n.property(key))
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    w.write_f32_le(value);
}

/// Writes the version 9 node properties; `None` writes the defaults.
fn write_properties(w: &mut ByteWriter, node: Option<&SceneNode>) {
    write_flag(w, node, "collidable", true);
    write_flag(w, node, "decorative", false);
    let color = node
        .and_then(|n| n.property("color"))
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);
    w.write_u32_le(color);
    write_flag(w, node, "favorite", false);
    w.write_u8(u8::from(node.is_none_or(SceneNode::visible)));
    for key in MIRROR_FLAGS {
        write_flag(w, node, key, false);
    }
    let effector = node.and_then(|n| n.property("ikEffectorId")).unwrap_or("");
    w.write_cstring(truncated_name(effector, MAX_NAME_LEN));
    write_flag(w, node, "ikConstraintsVisible", true);
    write_float(w, node, "ikRollMin", 0.0);
    write_float(w, node, "ikRollMax", std::f32::consts::TAU);
    // no constraints
    w.write_u32_le(0);
}

impl Saver<'_> {
    fn model_file_name(&self, id: NodeId, name: &str) -> String {
        let file = format!("{}{}.vxm", self.stem, file_name_part(name));
        if self.models.iter().any(|(existing, _)| *existing == file) {
            format!("{}{}_{}.vxm", self.stem, file_name_part(name), id.index())
        } else {
            file
        }
    }

    fn write_node(&mut self, w: &mut ByteWriter, id: NodeId) -> Result<(), FormatError> {
        let Some(node) = self.graph.node(id) else {
            return Ok(());
        };
        let name = match node.name() {
            "" => id.index().to_string(),
            name => truncated_name(name, MAX_NAME_LEN).to_owned(),
        };
        w.write_cstring(&name);
        match node.volume() {
            Some(volume) => {
                let file = self.model_file_name(id, &name);
                let mut model = SceneGraph::new();
                model.add_to_root(
                    SceneNode::model(&name, volume.clone())
                        .with_palette(self.graph.resolved_palette(id))
                        .with_transform(Transform {
                            translation: GridVector::zero(),
                            pivot: node.transform().pivot,
                        }),
                );
                let bytes = vxm::save(&model)?;
                log::debug!("vxr node {name:?} saved as {file}");
                w.write_cstring(&file);
                self.models.push((file, bytes));
            }
            None => w.write_cstring(""),
        }
        write_properties(w, Some(node));

        let children = node.children();
        write_child_count(w, children.len())?;
        for &child in children {
            self.write_node(w, child)?;
        }
        Ok(())
    }
}

/// Writes a version 9 rig whose model files are named `{stem}{node name}.vxm`.
///
/// Node translations and animations are not saved.
pub(crate) fn save(graph: &SceneGraph, stem: &str) -> Result<SavedRig, FormatError> {
    let root = graph.root();
    let children = root.children();
    if children.is_empty() {
        return Err(FormatError::EmptyScene);
    }

    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    w.write_u8(b'0' + SAVE_VERSION as u8);
    let animation = root.property("defaultanim").unwrap_or(DEFAULT_ANIMATION);
    w.write_cstring(truncated_name(animation, MAX_NAME_LEN));
    w.write_i32_le(1);
    let base_template = root.property("basetemplate").unwrap_or("");
    w.write_cstring(truncated_name(base_template, MAX_NAME_LEN));
    // not static
    w.write_u8(0);

    let has_controller = match children {
        [only] => graph.node(*only).is_some_and(|node| node.name() == CONTROLLER_NODE),
        _ => false,
    };
    if !has_controller {
        w.write_cstring(CONTROLLER_NODE);
        w.write_cstring("");
        write_properties(&mut w, None);
        write_child_count(&mut w, children.len())?;
    }

    let mut saver = Saver {
        graph,
        stem,
        models: Vec::new(),
    };
    for &child in children {
        saver.write_node(&mut w, child)?;
    }
    log::debug!("vxr rig refers to {} model files", saver.models.len());
    Ok(SavedRig {
        bytes: w.into_inner(),
        models: saver.models,
    })
}
