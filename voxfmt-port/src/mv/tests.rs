use pretty_assertions::assert_eq;

use voxfmt::math::Region;
use voxfmt::stream::ByteWriter;

use super::*;
use crate::ErrorKind;

#[test]
fn coordinate_transform() {
    let size = dot_vox::Size {
        x: 100,
        y: 200,
        z: 300,
    };
    let ours = mv_to_ours(size, [10, 20, 30]);
    assert_eq!(ours, GridPoint::new(10, 30, 179));
    assert_eq!(ours_to_mv(200, ours), [10, 20, 30]);
}

fn write_dict(w: &mut ByteWriter, entries: &[(&str, &str)]) {
    w.write_u32_le(entries.len() as u32);
    for (key, value) in entries {
        w.write_pascal_string_u32_le(key).unwrap();
        w.write_pascal_string_u32_le(value).unwrap();
    }
}

fn chunk(out: &mut ByteWriter, id: &[u8; 4], content: impl FnOnce(&mut ByteWriter)) {
    let mut body = ByteWriter::new();
    content(&mut body);
    out.write_bytes(id);
    out.write_u32_le(body.len() as u32);
    out.write_u32_le(0);
    out.write_bytes(body.as_slice());
}

fn transform_chunk(out: &mut ByteWriter, id: u32, attributes: &[(&str, &str)], child: u32, frame: &[(&str, &str)]) {
    chunk(out, b"nTRN", |w| {
        w.write_u32_le(id);
        write_dict(w, attributes);
        w.write_u32_le(child);
        w.write_i32_le(-1);
        w.write_u32_le(0);
        w.write_u32_le(1);
        write_dict(w, frame);
    });
}

/// A file with one 2×4×3 model holding one voxel, placed by a scene graph.
fn scene_file() -> Vec<u8> {
    let mut children = ByteWriter::new();
    chunk(&mut children, b"SIZE", |w| {
        for s in [2, 4, 3] {
            w.write_u32_le(s);
        }
    });
    chunk(&mut children, b"XYZI", |w| {
        w.write_u32_le(1);
        w.write_bytes(&[0, 0, 0, 6]);
    });
    transform_chunk(&mut children, 0, &[], 1, &[]);
    chunk(&mut children, b"nGRP", |w| {
        w.write_u32_le(1);
        write_dict(w, &[]);
        w.write_u32_le(1);
        w.write_u32_le(2);
    });
    transform_chunk(&mut children, 2, &[("_name", "tree")], 3, &[("_t", "5 6 7")]);
    chunk(&mut children, b"nSHP", |w| {
        w.write_u32_le(3);
        write_dict(w, &[]);
        w.write_u32_le(1);
        w.write_u32_le(0);
        write_dict(w, &[]);
    });

    let mut file = ByteWriter::new();
    file.write_bytes(b"VOX ");
    file.write_u32_le(150);
    file.write_bytes(b"MAIN");
    file.write_u32_le(0);
    file.write_u32_le(children.len() as u32);
    file.write_bytes(children.as_slice());
    file.into_inner()
}

#[test]
fn scene_translation_and_name() {
    let graph = load(&scene_file()).unwrap();
    assert_eq!(graph.model_count(), 1);
    let (id, node) = graph.model_nodes().next().unwrap();
    assert_eq!(node.name(), "tree");
    assert_eq!(node.property("_name"), Some("tree"));
    let volume = node.volume().unwrap();
    assert_eq!(
        volume.region(),
        Region::checked_from_size([2, 3, 4]).unwrap()
    );
    // the voxel at the MagicaVoxel origin, whose model lower corner is at (4, 4, 6)
    assert_eq!(volume.voxel([0, 0, 3]), Voxel::Generic(5));
    assert_eq!(graph.world_translation(id), Some(GridVector::new(4, 6, -8)));
}

#[test]
fn wrong_magic() {
    assert_eq!(load(b"VOXX\x96\0\0\0").unwrap_err().kind(), ErrorKind::InvalidMagic);
    assert_eq!(load(b"VO").unwrap_err().kind(), ErrorKind::Truncated);
}

#[test]
fn translation_attribute_must_have_three_numbers() {
    assert!(parse_translation(0, "1 -2 3").is_ok());
    for bad in ["1 2", "1 2 3 4", "a b c"] {
        assert_eq!(
            parse_translation(0, bad).unwrap_err().kind(),
            ErrorKind::MalformedStructure
        );
    }
}

#[test]
fn scene_cycle_detected() {
    let root = ParentList::cycle_and_depth_check(None, 0).unwrap();
    let child = ParentList::cycle_and_depth_check(Some(&root), 1).unwrap();
    assert!(ParentList::cycle_and_depth_check(Some(&child), 0).is_err());
    assert!(ParentList::cycle_and_depth_check(Some(&child), 2).is_ok());
}

fn sample_graph() -> SceneGraph {
    let palette = Palette::from_colors((0..=u8::MAX).map(|i| Rgba::rgb(i, 255 - i, 7))).unwrap();
    let mut volume =
        RawVolume::new(Region::checked_from_lower_upper([3, 3, 3], [4, 6, 5]).unwrap()).unwrap();
    volume.set_voxel([3, 3, 3], Voxel::Generic(0));
    volume.set_voxel([4, 6, 5], Voxel::Generic(17));
    volume.set_voxel([4, 3, 5], Voxel::Generic(254));
    let mut graph = SceneGraph::new();
    graph.add_to_root(SceneNode::model("m", volume).with_palette(palette));
    graph
}

#[test]
fn round_trip_keeps_indices() {
    let graph = sample_graph();
    let loaded = load(&save(&graph).unwrap()).unwrap();
    let (id, node) = loaded.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(volume.region(), Region::checked_from_size([2, 4, 3]).unwrap());
    assert_eq!(volume.solid_count(), 3);
    assert_eq!(volume.voxel([0, 0, 0]), Voxel::Generic(0));
    assert_eq!(volume.voxel([1, 3, 2]), Voxel::Generic(17));
    assert_eq!(volume.voxel([1, 0, 2]), Voxel::Generic(254));
    assert_eq!(loaded.resolved_palette(id).color(17), Rgba::rgb(17, 238, 7));
}

#[test]
fn last_index_is_replaced() {
    let palette = Palette::from_colors((0..=u8::MAX).map(|i| Rgba::rgb(i, i, i))).unwrap();
    let mut volume = RawVolume::new(Region::ORIGIN_VOXEL).unwrap();
    volume.set_voxel([0, 0, 0], Voxel::Generic(255));
    let model = model_from_volume(&volume, &palette).unwrap();
    assert_eq!(model.voxels[0].i, 254);
}

#[test]
fn too_large_to_save() {
    let volume = RawVolume::new(Region::checked_from_size([257, 1, 1]).unwrap()).unwrap();
    assert_eq!(
        model_from_volume(&volume, &Palette::builtin()).unwrap_err().kind(),
        ErrorKind::SizeLimitExceeded
    );
}
