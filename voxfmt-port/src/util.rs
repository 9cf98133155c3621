use std::io::{Read as _, Write as _};

use voxfmt::math::{GridSize, GridVector, Region};
use voxfmt::{MergedVolume, NodeId, Palette, RawVolume, SceneGraph, SceneNode, merge_volumes};

use crate::FormatError;

/// Validates declared dimensions, already in our axis order, and allocates an empty volume
/// with its lower corner at the origin.
///
/// Zero on any axis is malformed; more than `max` on any axis exceeds the format's limit.
pub(crate) fn volume_from_size(
    what: &'static str,
    size: [u32; 3],
    max: u32,
) -> Result<RawVolume, FormatError> {
    if size.contains(&0) {
        return Err(FormatError::malformed(format!(
            "{what} size {}x{}x{} is empty",
            size[0], size[1], size[2]
        )));
    }
    for axis_size in size {
        FormatError::check_limit(what, axis_size, max)?;
    }
    let region = Region::checked_from_size(GridSize::from(size))?;
    Ok(RawVolume::new(region)?)
}

/// Flattens `graph` for formats which hold one volume.
pub(crate) fn merged_for_save(graph: &SceneGraph) -> Result<MergedVolume, FormatError> {
    graph.merge()?.ok_or(FormatError::EmptyScene)
}

/// Constructs a graph holding one model node.
pub(crate) fn single_model_graph(
    name: impl Into<String>,
    volume: RawVolume,
    palette: Palette,
) -> SceneGraph {
    let mut graph = SceneGraph::new();
    graph.add_to_root(SceneNode::model(name, volume).with_palette(palette));
    graph
}

/// Checks that every axis of `region` is at most `max` long, for formats whose size
/// fields are narrower than ours.
pub(crate) fn check_save_size(
    what: &'static str,
    region: Region,
    max: u32,
) -> Result<(), FormatError> {
    let size = region.size();
    for axis_size in [size.width, size.height, size.depth] {
        FormatError::check_limit(what, axis_size, max)?;
    }
    Ok(())
}

/// Decompresses a zlib stream, reading at most `max_len` bytes of output.
pub(crate) fn inflate(data: &[u8], max_len: usize) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .take(max_len as u64)
        .read_to_end(&mut out)
        .map_err(FormatError::Compression)?;
    Ok(out)
}

/// Compresses `data` as a zlib stream.
pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).map_err(FormatError::Compression)?;
    encoder.finish().map_err(FormatError::Compression)
}

/// Names in formats with a one-byte length prefix.
pub(crate) fn truncated_name(name: &str, max_len: usize) -> &str {
    if name.len() <= max_len {
        return name;
    }
    log::warn!("truncating node name {name:?} to {max_len} bytes");
    let mut end = max_len;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn position_overflow(id: NodeId) -> FormatError {
    FormatError::malformed(format!(
        "position of node {id} is outside the coordinate range"
    ))
}

/// [`SceneGraph::world_translation()`], failing if the sum overflows.
pub(crate) fn world_translation(graph: &SceneGraph, id: NodeId) -> Result<GridVector, FormatError> {
    graph.world_translation(id).ok_or_else(|| position_overflow(id))
}

/// World position of the lower corner of model node `id`'s volume.
pub(crate) fn world_lower(graph: &SceneGraph, id: NodeId) -> Result<GridVector, FormatError> {
    graph
        .world_region(id)
        .map(|region| region.lower().to_vector())
        .ok_or_else(|| position_overflow(id))
}

/// `position - origin`, failing if a component overflows.
pub(crate) fn relative_position(
    position: GridVector,
    origin: GridVector,
) -> Result<GridVector, FormatError> {
    match (
        position.x.checked_sub(origin.x),
        position.y.checked_sub(origin.y),
        position.z.checked_sub(origin.z),
    ) {
        (Some(x), Some(y), Some(z)) => Ok(GridVector::new(x, y, z)),
        _ => Err(FormatError::malformed(format!(
            "offset from {origin:?} to {position:?} is outside the coordinate range"
        ))),
    }
}

/// Composites every model of `children`, positioned relative to `own`'s coordinates,
/// over `own`. Used to flatten compound nodes on load.
pub(crate) fn flatten_onto(own: &RawVolume, children: &SceneGraph) -> Result<RawVolume, FormatError> {
    let mut placed = vec![(own, GridVector::zero())];
    for (id, node) in children.model_nodes() {
        if let Some(volume) = node.volume() {
            placed.push((volume, world_translation(children, id)?));
        }
    }
    Ok(merge_volumes(placed)?.unwrap_or_else(|| own.clone()))
}

/// Parses exactly `N` whitespace-separated numbers from one line of a text format.
pub(crate) fn parse_numbers<T: std::str::FromStr, const N: usize>(
    what: &str,
    text: &str,
) -> Result<[T; N], FormatError> {
    let bad = || FormatError::malformed(format!("expected {N} numbers for {what}, found {text:?}"));
    let values = text
        .split_ascii_whitespace()
        .map(|word| word.parse().map_err(|_| bad()))
        .collect::<Result<Vec<T>, FormatError>>()?;
    <[T; N]>::try_from(values).map_err(|_| bad())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn names_are_cut_at_char_boundaries() {
        assert_eq!(truncated_name("short", 16), "short");
        assert_eq!(truncated_name("abcdé", 5), "abcd");
        assert_eq!(truncated_name("abcdéf", 6), "abcdé");
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_numbers::<u32, 3>("dim", " 1 2\t3 ").unwrap(), [1, 2, 3]);
        assert!(parse_numbers::<u32, 3>("dim", "1 2").is_err());
        assert!(parse_numbers::<u32, 3>("dim", "1 2 3 4").is_err());
        assert_eq!(
            parse_numbers::<f32, 2>("scale", "1.5 x").unwrap_err().kind(),
            ErrorKind::MalformedStructure
        );
    }

    #[test]
    fn inflate_is_limited() {
        let data = deflate(&[7; 1000]).unwrap();
        assert_eq!(inflate(&data, 2000).unwrap().len(), 1000);
        assert_eq!(inflate(&data, 10).unwrap(), vec![7; 10]);
    }

    #[test]
    fn zero_size_is_malformed() {
        assert_eq!(
            volume_from_size("test", [1, 0, 1], 10).unwrap_err().kind(),
            ErrorKind::MalformedStructure
        );
        assert_eq!(
            volume_from_size("test", [1, 11, 1], 10).unwrap_err().kind(),
            ErrorKind::SizeLimitExceeded
        );
    }
}
