//! MagicaVoxel `.vox`, parsed and written by [`dot_vox`].
//!
//! MagicaVoxel is Z-up; its Y axis becomes our Z axis, inverted.

use voxfmt::math::{GridPoint, GridVector, Rgba};
use voxfmt::stream::ByteReader;
use voxfmt::{Palette, RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::util::{check_save_size, volume_from_size};

#[cfg(test)]
mod tests;

const MAGIC: &str = "VOX ";
const MAX_MODEL_SIZE: u32 = 256;
const MAX_SCENE_DEPTH: u32 = 100;
/// Version number MagicaVoxel 0.99 writes.
const VERSION: u32 = 150;
/// Voxels store `index + 1` on disk, so this index cannot be written.
const UNWRITABLE_INDEX: u8 = 255;

/// Converts a voxel position within a model of the given MagicaVoxel size to ours.
pub(crate) fn mv_to_ours(mv_size: dot_vox::Size, [x, y, z]: [u8; 3]) -> GridPoint {
    let [x, y, z] = [x, y, z].map(i32::from);
    GridPoint::new(x, z, mv_size.y as i32 - 1 - y)
}

/// Inverse of [`mv_to_ours()`], for a point relative to the lower corner of a region of
/// the given depth.
fn ours_to_mv(depth: u32, point: GridPoint) -> [u8; 3] {
    [point.x, depth as i32 - 1 - point.z, point.y].map(|c| c as u8)
}

fn model_volume(model: &dot_vox::Model) -> Result<RawVolume, FormatError> {
    let dot_vox::Size { x, y, z } = model.size;
    let mut volume = volume_from_size("vox model", [x, z, y], MAX_MODEL_SIZE)?;
    for v in &model.voxels {
        volume.set_voxel(mv_to_ours(model.size, [v.x, v.y, v.z]), Voxel::Generic(v.i));
    }
    Ok(volume)
}

/// One shape's model placed in the scene.
struct SceneElement<'data> {
    model_id: u32,
    /// Sum of the `_t` attributes above the shape, in MagicaVoxel axes, or [`None`] if
    /// the file has no scene graph.
    translation: Option<[i32; 3]>,
    attributes: Option<&'data dot_vox::Dict>,
}

impl SceneElement<'_> {
    /// Translation of the lower corner of the model, in our axes.
    fn our_translation(&self, mv_size: dot_vox::Size) -> Option<GridVector> {
        let Some([tx, ty, tz]) = self.translation else {
            return Some(GridVector::zero());
        };
        // MagicaVoxel positions the center of the model, rounding down.
        let lower = |t: i32, size: u32| i64::from(t) - i64::from(size / 2);
        let [lx, ly, lz] = [lower(tx, mv_size.x), lower(ty, mv_size.y), lower(tz, mv_size.z)];
        Some(GridVector::new(
            i32::try_from(lx).ok()?,
            i32::try_from(lz).ok()?,
            i32::try_from(-ly - i64::from(mv_size.y)).ok()?,
        ))
    }
}

fn translation_overflow(scene_index: u32) -> FormatError {
    FormatError::malformed(format!(
        "translation of scene node {scene_index} is outside the coordinate range"
    ))
}

fn parse_translation(scene_index: u32, text: &str) -> Result<[i32; 3], FormatError> {
    let invalid =
        || FormatError::malformed(format!("attribute _t of scene node {scene_index} is invalid"));
    let components = text
        .split_whitespace()
        .map(|s| s.parse::<i32>().map_err(|_| invalid()))
        .collect::<Result<Vec<i32>, FormatError>>()?;
    <[i32; 3]>::try_from(components).map_err(|_| invalid())
}

pub(crate) fn warn_extra_attributes(
    thing: core::fmt::Arguments<'_>,
    attributes: &dot_vox::Dict,
    expected_attributes: &[&'static str],
) {
    let unexpected = Vec::from_iter(
        attributes.keys().filter(|key| !expected_attributes.contains(&key.as_str())),
    );
    if !unexpected.is_empty() {
        log::info!("{thing} contains unknown attributes {unexpected:?}");
    }
}

/// Used for cycle detection when walking the scene graph.
struct ParentList<'a> {
    index: u32,
    parent: Option<&'a ParentList<'a>>,
}

impl<'a> ParentList<'a> {
    fn cycle_and_depth_check(list: Option<&'a Self>, index: u32) -> Result<Self, FormatError> {
        if let Some(list) = list {
            list.check_inner(index, MAX_SCENE_DEPTH)?;
        }
        Ok(ParentList {
            index,
            parent: list,
        })
    }

    fn check_inner(&self, index: u32, max_depth: u32) -> Result<(), FormatError> {
        if self.index == index {
            Err(FormatError::malformed(format!(
                "scene graph contains a cycle involving node {index}"
            )))
        } else if let Some(parent) = self.parent {
            parent.check_inner(
                index,
                max_depth
                    .checked_sub(1)
                    .ok_or_else(|| FormatError::malformed("scene graph is nested too deeply"))?,
            )
        } else {
            Ok(())
        }
    }
}

/// Walks the scene graph, collecting each shape's models with their accumulated
/// translation. `attributes` belong to the nearest transform node above.
fn walk_scene_graph<'data>(
    data: &'data dot_vox::DotVoxData,
    scene_index: u32,
    translation: [i32; 3],
    attributes: Option<&'data dot_vox::Dict>,
    parent_node_list: Option<&ParentList<'_>>,
    output: &mut Vec<SceneElement<'data>>,
) -> Result<(), FormatError> {
    let parent_node_list = Some(&ParentList::cycle_and_depth_check(
        parent_node_list,
        scene_index,
    )?);

    let node = data
        .scenes
        .get(scene_index as usize)
        .ok_or_else(|| FormatError::malformed(format!("missing scene node {scene_index}")))?;
    match node {
        &dot_vox::SceneNode::Transform {
            attributes: ref node_attributes,
            ref frames,
            child,
            layer_id: _,
        } => {
            warn_extra_attributes(
                format_args!("transform node #{scene_index}"),
                node_attributes,
                &["_name", "_hidden"],
            );
            let frame = frames.first();
            if let Some(frame) = frame {
                warn_extra_attributes(
                    format_args!("first frame of transform node #{scene_index}"),
                    &frame.attributes,
                    &["_t", "_r"],
                );
                if frame.attributes.contains_key("_r") {
                    log::debug!("ignoring rotation of transform node #{scene_index}");
                }
            }
            let [dx, dy, dz] = match frame.and_then(|f| f.attributes.get("_t")) {
                Some(text) => parse_translation(scene_index, text)?,
                None => [0; 3],
            };
            let [x, y, z] = translation;
            let sum = match (x.checked_add(dx), y.checked_add(dy), z.checked_add(dz)) {
                (Some(x), Some(y), Some(z)) => [x, y, z],
                _ => return Err(translation_overflow(scene_index)),
            };
            walk_scene_graph(
                data,
                child,
                sum,
                Some(node_attributes),
                parent_node_list,
                output,
            )?;
        }
        dot_vox::SceneNode::Group {
            attributes: node_attributes,
            children,
        } => {
            warn_extra_attributes(
                format_args!("group node #{scene_index}"),
                node_attributes,
                &[],
            );
            for &child in children {
                walk_scene_graph(data, child, translation, None, parent_node_list, output)?;
            }
        }
        dot_vox::SceneNode::Shape {
            attributes: node_attributes,
            models,
        } => {
            warn_extra_attributes(
                format_args!("shape node #{scene_index}"),
                node_attributes,
                &[],
            );
            output.extend(models.iter().map(|shape_model| SceneElement {
                model_id: shape_model.model_id,
                translation: Some(translation),
                attributes,
            }));
        }
    }
    Ok(())
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    FormatError::check_magic(MAGIC, ByteReader::new(bytes).peek_bytes(4)?)?;
    let data = dot_vox::load_bytes(bytes).map_err(FormatError::malformed)?;
    log::debug!(
        "vox version {}: {} models, {} scene nodes, {} ignored layers, {} ignored materials",
        data.version,
        data.models.len(),
        data.scenes.len(),
        data.layers.len(),
        data.materials.len(),
    );
    let palette = Palette::from_colors(
        data.palette
            .iter()
            .map(|&dot_vox::Color { r, g, b, a }| Rgba::new(r, g, b, a)),
    )?;

    let mut elements = Vec::new();
    if data.scenes.is_empty() {
        elements.extend((0..data.models.len()).map(|i| SceneElement {
            model_id: i as u32,
            translation: None,
            attributes: None,
        }));
    } else {
        walk_scene_graph(&data, 0, [0; 3], None, None, &mut elements)?;
    }

    let mut graph = SceneGraph::new();
    for element in elements {
        let model = data.models.get(element.model_id as usize).ok_or_else(|| {
            FormatError::malformed(format!("missing model {}", element.model_id))
        })?;
        let name = element
            .attributes
            .and_then(|a| a.get("_name"))
            .cloned()
            .unwrap_or_else(|| format!("model {}", element.model_id));
        let hidden = element.attributes.and_then(|a| a.get("_hidden")).map(String::as_str);
        let translation = element.our_translation(model.size).ok_or_else(|| {
            FormatError::malformed(format!(
                "translation of model {} is outside the coordinate range",
                element.model_id
            ))
        })?;
        let mut node = SceneNode::model(name, model_volume(model)?)
            .with_palette(palette.clone())
            .with_visible(hidden != Some("1"))
            .with_transform(Transform::from_translation(translation));
        if let Some(attributes) = element.attributes {
            for (key, value) in attributes {
                node.set_property(key.clone(), value.clone());
            }
        }
        graph.add_to_root(node);
    }
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

fn model_from_volume(volume: &RawVolume, palette: &Palette) -> Result<dot_vox::Model, FormatError> {
    let region = volume.region();
    check_save_size("vox model size", region, MAX_MODEL_SIZE)?;
    let lower = region.lower().to_vector();
    let replacement = palette.find_replacement(UNWRITABLE_INDEX).unwrap_or(UNWRITABLE_INDEX - 1);
    let voxels = volume
        .solid_voxels()
        .map(|(point, index)| {
            let [x, y, z] = ours_to_mv(region.depth(), point - lower);
            let i = if index == UNWRITABLE_INDEX {
                replacement
            } else {
                index
            };
            dot_vox::Voxel { x, y, z, i }
        })
        .collect();
    Ok(dot_vox::Model {
        size: dot_vox::Size {
            x: region.width(),
            y: region.depth(),
            z: region.height(),
        },
        voxels,
    })
}

/// Node translations are not written; every model is saved at the origin of the scene.
pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let (palette, volumes) = graph.models_with_shared_palette();
    if volumes.len() > 1 {
        log::warn!("vox export places all {} models at the origin", volumes.len());
    }
    let models = volumes
        .iter()
        .map(|(_, volume)| model_from_volume(volume, &palette))
        .collect::<Result<Vec<_>, FormatError>>()?;
    let mv_palette = (0..=u8::MAX)
        .map(|i| {
            let [r, g, b, a] = palette.get(i).unwrap_or(Rgba::BLACK).to_array();
            dot_vox::Color { r, g, b, a }
        })
        .collect();

    let data = dot_vox::DotVoxData {
        version: VERSION,
        models,
        palette: mv_palette,
        materials: Vec::new(),
        scenes: Vec::new(),
        layers: Vec::new(),
    };
    let mut bytes = Vec::new();
    data.write_vox(&mut bytes).map_err(FormatError::Write)?;
    Ok(bytes)
}
