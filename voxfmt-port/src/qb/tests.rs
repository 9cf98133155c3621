use pretty_assertions::assert_eq;
use rstest::rstest;

use voxfmt::math::{GridPoint, Region};
use voxfmt::{Palette, SceneGraph, SceneNode};

use super::*;
use crate::ErrorKind;

fn header(w: &mut ByteWriter, handedness: u32, compression: u32, matrices: u32) {
    for field in [VERSION, 0, handedness, compression, 0, matrices] {
        w.write_u32_le(field);
    }
}

fn matrix_header(w: &mut ByteWriter, size: [u32; 3], offset: [i32; 3]) {
    w.write_pascal_string_u8("m").unwrap();
    for s in size {
        w.write_u32_le(s);
    }
    for o in offset {
        w.write_i32_le(o);
    }
}

#[test]
fn single_red_voxel_rle() {
    let mut w = ByteWriter::new();
    header(&mut w, 0, 1, 1);
    matrix_header(&mut w, [1, 1, 1], [0, 0, 0]);
    w.write_bytes(&[255, 0, 0, 255]);
    w.write_u32_le(NEXT_SLICE_FLAG);

    let graph = load(w.as_slice()).unwrap();
    assert_eq!(graph.model_count(), 1);
    let (id, node) = graph.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(volume.region(), Region::ORIGIN_VOXEL);
    assert_eq!(volume.solid_count(), 1);
    let index = volume.voxel([0, 0, 0]).color_index().unwrap();
    assert_eq!(graph.resolved_palette(id).color(index), Rgba::rgb(255, 0, 0));
}

#[test]
fn rle_run_and_slices() {
    // 2×2×2, left handed: slice z=0 is one run of 4 blue, slice z=1 has one green then air
    let mut w = ByteWriter::new();
    header(&mut w, 0, 1, 1);
    matrix_header(&mut w, [2, 2, 2], [5, 6, 7]);
    w.write_u32_le(RLE_FLAG);
    w.write_u32_le(4);
    w.write_bytes(&[0, 0, 255, 255]);
    w.write_u32_le(NEXT_SLICE_FLAG);
    w.write_bytes(&[0, 255, 0, 255]);
    w.write_bytes(&[0, 0, 0, 0]);
    w.write_u32_le(NEXT_SLICE_FLAG);

    let graph = load(w.as_slice()).unwrap();
    let (id, node) = graph.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    let palette = graph.resolved_palette(id);
    let color_at = |p: [i32; 3]| volume.voxel(p).color_index().map(|i| palette.color(i));
    for p in [[0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 0]] {
        assert_eq!(color_at(p), Some(Rgba::rgb(0, 0, 255)));
    }
    assert_eq!(color_at([0, 0, 1]), Some(Rgba::rgb(0, 255, 0)));
    assert_eq!(color_at([1, 0, 1]), None);
    assert_eq!(node.transform().translation, GridVector::new(5, 6, 7));
}

#[test]
fn right_handed_swaps_x_and_z() {
    // file size 2×1×1 (x, y, z in file order) becomes 1×1×2 in ours
    let mut w = ByteWriter::new();
    header(&mut w, 1, 0, 1);
    matrix_header(&mut w, [2, 1, 1], [1, 2, 3]);
    w.write_bytes(&[255, 255, 255, 255]);
    w.write_bytes(&[0, 0, 0, 0]);

    let graph = load(w.as_slice()).unwrap();
    let (_, node) = graph.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(
        volume.region(),
        Region::checked_from_lower_upper([0, 0, 0], [0, 0, 1]).unwrap()
    );
    assert!(!volume.voxel([0, 0, 0]).is_air());
    assert!(volume.voxel([0, 0, 1]).is_air());
    assert_eq!(node.transform().translation, GridVector::new(3, 2, 1));
}

#[test]
fn bgra_color_order() {
    let mut w = ByteWriter::new();
    for field in [VERSION, 1, 0, 0, 0, 1] {
        w.write_u32_le(field);
    }
    matrix_header(&mut w, [1, 1, 1], [0, 0, 0]);
    w.write_bytes(&[10, 20, 30, 255]);
    let graph = load(w.as_slice()).unwrap();
    let (id, node) = graph.model_nodes().next().unwrap();
    let index = node.volume().unwrap().voxel([0, 0, 0]).color_index().unwrap();
    assert_eq!(graph.resolved_palette(id).color(index), Rgba::rgb(30, 20, 10));
}

#[rstest]
#[case([0, 1, 1], ErrorKind::MalformedStructure)]
#[case([1, 2049, 1], ErrorKind::SizeLimitExceeded)]
fn bad_matrix_sizes(#[case] size: [u32; 3], #[case] kind: ErrorKind) {
    let mut w = ByteWriter::new();
    header(&mut w, 0, 1, 1);
    matrix_header(&mut w, size, [0, 0, 0]);
    assert_eq!(load(w.as_slice()).unwrap_err().kind(), kind);
}

#[test]
fn too_many_matrices() {
    let mut w = ByteWriter::new();
    header(&mut w, 0, 1, MAX_MATRICES + 1);
    assert_eq!(
        load(w.as_slice()).unwrap_err().kind(),
        ErrorKind::SizeLimitExceeded
    );
}

#[test]
fn oversized_run_fails() {
    let mut w = ByteWriter::new();
    header(&mut w, 0, 1, 1);
    matrix_header(&mut w, [1, 1, 1], [0, 0, 0]);
    w.write_u32_le(RLE_FLAG);
    w.write_u32_le(2);
    w.write_bytes(&[1, 1, 1, 255]);
    assert_eq!(
        load(w.as_slice()).unwrap_err().kind(),
        ErrorKind::MalformedStructure
    );
}

#[test]
fn missing_slice_marker_is_truncated() {
    let mut w = ByteWriter::new();
    header(&mut w, 0, 1, 1);
    matrix_header(&mut w, [1, 1, 1], [0, 0, 0]);
    w.write_bytes(&[1, 1, 1, 255]);
    assert_eq!(load(w.as_slice()).unwrap_err().kind(), ErrorKind::Truncated);
}

fn sample_graph() -> SceneGraph {
    let palette = Palette::from_colors([Rgba::rgb(200, 10, 10), Rgba::rgb(10, 10, 200)]).unwrap();
    let mut volume =
        RawVolume::new(Region::checked_from_lower_upper([0, 0, 0], [5, 1, 2]).unwrap()).unwrap();
    for x in 0..6 {
        volume.set_voxel([x, 0, 0], Voxel::Generic(0));
    }
    volume.set_voxel([2, 1, 2], Voxel::Generic(1));
    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("body", volume)
            .with_palette(palette)
            .with_transform(Transform::from_translation(GridVector::new(-3, 4, 9))),
    );
    graph
}

#[rstest]
fn round_trip(#[values(Handedness::Left, Handedness::Right)] handedness: Handedness) {
    let graph = sample_graph();
    let bytes = save(&graph, &SaveOptions::default().with_qb_handedness(handedness)).unwrap();
    let loaded = load(&bytes).unwrap();

    let (orig_id, orig) = graph.model_nodes().next().unwrap();
    let (id, node) = loaded.model_nodes().next().unwrap();
    assert_eq!(node.name(), "body");
    assert_eq!(loaded.world_region(id), graph.world_region(orig_id));
    let orig_palette = graph.resolved_palette(orig_id);
    let palette = loaded.resolved_palette(id);
    for (point, voxel) in orig.volume().unwrap().iter() {
        let loaded_voxel = node.volume().unwrap().voxel(point);
        assert_eq!(
            loaded_voxel.color_index().map(|i| palette.color(i)),
            voxel.color_index().map(|i| orig_palette.color(i)),
            "at {point:?}"
        );
    }
}

#[test]
fn long_runs_are_compressed() {
    let bytes = save(&sample_graph(), &SaveOptions::default()).unwrap();
    let r = &mut ByteReader::new(&bytes);
    read_header(r).unwrap();
    r.read_pascal_string_u8().unwrap();
    r.skip(24).unwrap();
    // first row of slice 0 is 6 red voxels
    assert_eq!(r.read_u32_le(), Ok(RLE_FLAG));
    assert_eq!(r.read_u32_le(), Ok(6));
    assert_eq!(r.read_array::<4>(), Ok([200, 10, 10, 255]));
}

#[test]
fn decode_is_idempotent() {
    let bytes = save(&sample_graph(), &SaveOptions::default()).unwrap();
    assert_eq!(load(&bytes).unwrap(), load(&bytes).unwrap());
}

#[test]
fn orientation_helper() {
    assert_eq!(
        file_to_ours(Handedness::Right, [1, 2, 3]),
        GridPoint::new(3, 2, 1)
    );
}
