use pretty_assertions::assert_eq;

use voxfmt::math::Region;
use voxfmt::{Palette, RawVolume, SceneNode};

use super::*;
use crate::ErrorKind;

#[test]
fn x_fastest_then_z() {
    let mut w = ByteWriter::new();
    for d in [2, 1, 2] {
        w.write_u32_le(d);
    }
    // width 2, depth 1, height 2
    w.write_bytes(&[9, 9, 9, 0, 0, 0]);
    w.write_bytes(&[0, 0, 0, 1, 2, 3]);

    let graph = load(w.as_slice()).unwrap();
    let (id, node) = graph.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(volume.region(), Region::checked_from_size([2, 2, 1]).unwrap());
    let palette = graph.resolved_palette(id);
    assert_eq!(volume.voxel([0, 0, 0]), Voxel::Generic(0));
    assert_eq!(palette.color(0), Rgba::rgb(9, 9, 9));
    assert_eq!(volume.voxel([1, 0, 0]), Voxel::Air);
    assert_eq!(volume.voxel([0, 1, 0]), Voxel::Air);
    assert_eq!(volume.voxel([1, 1, 0]), Voxel::Generic(1));
    assert_eq!(palette.color(1), Rgba::rgb(1, 2, 3));
}

#[test]
fn truncated_voxels() {
    let mut w = ByteWriter::new();
    for d in [2, 2, 2] {
        w.write_u32_le(d);
    }
    w.write_bytes(&[1; 7 * 3]);
    assert_eq!(load(w.as_slice()).unwrap_err().kind(), ErrorKind::Truncated);
}

#[test]
fn zero_size_is_malformed() {
    let mut w = ByteWriter::new();
    for d in [0, 2, 2] {
        w.write_u32_le(d);
    }
    assert_eq!(
        load(w.as_slice()).unwrap_err().kind(),
        ErrorKind::MalformedStructure
    );
}

#[test]
fn black_survives_saving() {
    let palette = Palette::from_colors([Rgba::BLACK, Rgba::rgb(10, 20, 30)]).unwrap();
    let mut volume = RawVolume::new(Region::checked_from_lower_size([4, 4, 4], [1, 2, 1]).unwrap())
        .unwrap();
    volume.set_voxel([4, 4, 4], Voxel::Generic(0));
    volume.set_voxel([4, 5, 4], Voxel::Generic(1));
    let mut graph = SceneGraph::new();
    graph.add_to_root(SceneNode::model("m", volume).with_palette(palette));

    let bytes = save(&graph).unwrap();
    assert_eq!(
        bytes.as_slice(),
        &[1, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 1, 10, 20, 30]
    );
    let loaded = load(&bytes).unwrap();
    let volume = loaded.model_nodes().next().unwrap().1.volume().unwrap();
    assert_eq!(volume.solid_count(), 2);
}
