//! [`SceneGraph`]: the tree of named, transformed volumes that codecs produce and consume.

use std::collections::BTreeMap;
use std::fmt;

use crate::math::{GridVector, Region, RegionError, checked_add_vectors};
use crate::{Palette, PaletteLookup, RawVolume, Voxel, VolumeError, merge_volumes};

/// Identifies a node within one [`SceneGraph`].
///
/// Identifiers are indices into the graph's node storage, assigned in insertion order;
/// the root is always [`SceneGraph::ROOT`].
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of this node in insertion order (the root is 0).
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Placement of a node relative to its parent.
///
/// Both fields are in whole voxels. Formats that store fractional pivots are rounded on
/// import.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[allow(clippy::exhaustive_structs)]
pub struct Transform {
    /// Offset of the node's volume coordinates from its parent's.
    pub translation: GridVector,
    /// Point about which the node would be rotated or scaled, in the node's own coordinates.
    pub pivot: GridVector,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Transform = Transform {
        translation: GridVector::new(0, 0, 0),
        pivot: GridVector::new(0, 0, 0),
    };

    /// A transform which only translates.
    #[inline]
    pub fn from_translation(translation: GridVector) -> Self {
        Self {
            translation,
            pivot: GridVector::zero(),
        }
    }
}

/// What a [`SceneNode`] is.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SceneNodeKind {
    /// The unique root of the graph.
    Root,
    /// A node which only groups its children.
    Group,
    /// A node owning a volume.
    Model(RawVolume),
}

/// One node of a [`SceneGraph`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SceneNode {
    name: String,
    kind: SceneNodeKind,
    visible: bool,
    transform: Transform,
    palette: Option<Palette>,
    properties: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    fn new(name: impl Into<String>, kind: SceneNodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            visible: true,
            transform: Transform::IDENTITY,
            palette: None,
            properties: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Constructs a model node owning `volume`.
    pub fn model(name: impl Into<String>, volume: RawVolume) -> Self {
        Self::new(name, SceneNodeKind::Model(volume))
    }

    /// Constructs a group node.
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, SceneNodeKind::Group)
    }

    /// Sets the palette this node's voxel indices refer to.
    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Sets the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the visibility flag.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Adds a string property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Name of the node, as it appeared in the file (possibly empty).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// What this node is.
    pub fn kind(&self) -> &SceneNodeKind {
        &self.kind
    }

    /// Whether this node owns a volume.
    pub fn is_model(&self) -> bool {
        matches!(self.kind, SceneNodeKind::Model(_))
    }

    /// The owned volume, if this is a model node.
    pub fn volume(&self) -> Option<&RawVolume> {
        match &self.kind {
            SceneNodeKind::Model(volume) => Some(volume),
            _ => None,
        }
    }

    /// The owned volume, if this is a model node.
    pub fn volume_mut(&mut self) -> Option<&mut RawVolume> {
        match &mut self.kind {
            SceneNodeKind::Model(volume) => Some(volume),
            _ => None,
        }
    }

    /// Whether the node is shown.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Sets whether the node is shown.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Placement relative to the parent.
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Replaces the placement relative to the parent.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    /// The node's own palette, if it has one.
    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Replaces the node's own palette.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = Some(palette);
    }

    /// Looks up a string property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Sets a string property, replacing any previous value.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// All string properties, sorted by key.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The parent node; [`None`] only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A tree of [`SceneNode`]s, as decoded from or to be encoded to a file.
///
/// Nodes are stored in insertion order, which is the layer order of the file. A node can
/// only be attached to a parent which already exists, so the structure is always a tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Identifier of the root node, which every graph has.
    pub const ROOT: NodeId = NodeId(0);

    /// Constructs a graph containing only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![SceneNode::new("root", SceneNodeKind::Root)],
        }
    }

    /// Inserts `node` as the last child of `parent` and returns its identifier.
    pub fn add(&mut self, node: SceneNode, parent: NodeId) -> Result<NodeId, SceneGraphError> {
        if parent.0 >= self.nodes.len() {
            return Err(SceneGraphError::MissingParent(parent));
        }
        Ok(self.attach(node, parent))
    }

    /// Inserts `node` as the last child of the root.
    pub fn add_to_root(&mut self, node: SceneNode) -> NodeId {
        self.attach(node, Self::ROOT)
    }

    /// `parent` must already exist.
    fn attach(&mut self, mut node: SceneNode, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Returns the node with the given identifier.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    /// Returns the node with the given identifier.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    /// The root node.
    pub fn root(&self) -> &SceneNode {
        &self.nodes[0]
    }

    /// Iterates over all nodes, root first, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Iterates over the model nodes in insertion order.
    pub fn model_nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.iter().filter(|(_, node)| node.is_model())
    }

    /// Number of model nodes.
    pub fn model_count(&self) -> usize {
        self.model_nodes().count()
    }

    /// Total number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph contains no model nodes.
    pub fn is_empty(&self) -> bool {
        self.model_nodes().next().is_none()
    }

    /// Removes every node except the root, dropping all volumes.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0].children.clear();
    }

    /// The palette in effect for `id`: the nearest palette found walking from the node up
    /// to the root, or the built-in palette if none is set.
    pub fn resolved_palette(&self, id: NodeId) -> Palette {
        let mut current = self.node(id);
        while let Some(node) = current {
            if let Some(palette) = node.palette() {
                return palette.clone();
            }
            current = node.parent.and_then(|p| self.node(p));
        }
        Palette::builtin()
    }

    /// Sum of the translations from the root down to and including `id`.
    ///
    /// Returns [`None`] if the sum overflows.
    pub fn world_translation(&self, id: NodeId) -> Option<GridVector> {
        let mut total = GridVector::zero();
        let mut current = self.node(id);
        while let Some(node) = current {
            total = checked_add_vectors(total, node.transform.translation)?;
            current = node.parent.and_then(|p| self.node(p));
        }
        Some(total)
    }

    /// Region of the model node `id` after applying [`SceneGraph::world_translation()`].
    ///
    /// Returns [`None`] for nodes without a volume and for regions that cannot be
    /// represented.
    pub fn world_region(&self, id: NodeId) -> Option<Region> {
        let volume = self.node(id)?.volume()?;
        volume.region().translate(self.world_translation(id)?).ok()
    }

    /// Returns a copy of every model volume with its indices referring to one palette.
    ///
    /// If all model nodes resolve to the same palette, that palette is used and indices are
    /// unchanged; otherwise colors are re-quantized into a combined palette. Used by
    /// formats which store one palette for the whole file.
    pub fn models_with_shared_palette(&self) -> (Palette, Vec<(NodeId, RawVolume)>) {
        let models: Vec<(NodeId, &RawVolume, Palette)> = self
            .model_nodes()
            .filter_map(|(id, node)| Some((id, node.volume()?, self.resolved_palette(id))))
            .collect();
        let Some(first) = models.first() else {
            return (Palette::builtin(), Vec::new());
        };
        if models.iter().all(|m| m.2 == first.2) {
            let palette = first.2.clone();
            let volumes = models
                .into_iter()
                .map(|(id, volume, _)| (id, volume.clone()))
                .collect();
            return (palette, volumes);
        }

        let mut lookup = PaletteLookup::default();
        let volumes = models
            .into_iter()
            .map(|(id, volume, palette)| {
                let mut remapped = volume.clone();
                for (point, index) in volume.solid_voxels() {
                    remapped.set_voxel(point, Voxel::Generic(lookup.get_or_add(palette.color(index))));
                }
                (id, remapped)
            })
            .collect();
        log::debug!(
            "re-quantized {} model palettes into {} colors",
            self.model_count(),
            lookup.palette().color_count()
        );
        (lookup.into_palette(), volumes)
    }

    /// Flattens every model node into one volume in world coordinates, with one palette
    /// chosen as by [`SceneGraph::models_with_shared_palette()`].
    ///
    /// Later nodes overwrite earlier ones where both are solid.
    /// Returns [`Ok(None)`] if there are no model nodes, and an error if a node's
    /// position overflows the coordinate range.
    pub fn merge(&self) -> Result<Option<MergedVolume>, VolumeError> {
        let (palette, volumes) = self.models_with_shared_palette();
        let placed: Vec<(&RawVolume, GridVector)> = volumes
            .iter()
            .map(|(id, volume)| {
                let translation = self.world_translation(*id).ok_or(VolumeError::Region(
                    RegionError::Overflow {
                        lower: volume.region().lower(),
                        size: volume.region().size(),
                    },
                ))?;
                Ok((volume, translation))
            })
            .collect::<Result<_, VolumeError>>()?;
        let Some(merged) = merge_volumes(placed)? else {
            return Ok(None);
        };
        log::debug!(
            "merged {} model nodes into region {:?}",
            volumes.len(),
            merged.region()
        );
        Ok(Some(MergedVolume {
            volume: merged,
            palette,
        }))
    }
}

/// Result of [`SceneGraph::merge()`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[allow(clippy::exhaustive_structs)]
pub struct MergedVolume {
    /// All model voxels, in world coordinates.
    pub volume: RawVolume,
    /// The palette `volume`'s indices refer to.
    pub palette: Palette,
}

/// Errors from modifying a [`SceneGraph`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SceneGraphError {
    /// The requested parent does not exist in this graph.
    #[error("scene graph has no node {0}")]
    MissingParent(NodeId),
}

#[cfg(test)]
mod tests;
