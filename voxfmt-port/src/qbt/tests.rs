use pretty_assertions::assert_eq;
use rstest::rstest;

use voxfmt::math::Region;

use super::*;
use crate::ErrorKind;

fn header(w: &mut ByteWriter) {
    w.write_bytes(b"QB 2");
    w.write_u8(1);
    w.write_u8(0);
    for _ in 0..3 {
        w.write_f32_le(1.0);
    }
}

fn color_map(w: &mut ByteWriter, colors: &[[u8; 4]]) {
    w.write_bytes(b"COLORMAP");
    w.write_u32_le(colors.len() as u32);
    for c in colors {
        w.write_bytes(c);
    }
}

fn matrix_body(
    w: &mut ByteWriter,
    name: &str,
    position: [i32; 3],
    size: [u32; 3],
    voxels: &[[u8; 4]],
) {
    w.write_pascal_string_u32_le(name).unwrap();
    for p in position {
        w.write_i32_le(p);
    }
    for _ in 0..3 {
        w.write_u32_le(1);
    }
    for _ in 0..3 {
        w.write_f32_le(0.0);
    }
    for s in size {
        w.write_u32_le(s);
    }
    let data = deflate(&voxels.concat()).unwrap();
    w.write_u32_le(data.len() as u32);
    w.write_bytes(&data);
}

fn matrix_node(w: &mut ByteWriter, name: &str, position: [i32; 3], voxel: [u8; 4]) {
    write_framed(w, NODE_MATRIX, |w| {
        matrix_body(w, name, position, [1, 1, 1], &[voxel]);
        Ok(())
    })
    .unwrap();
}

fn compound_file() -> Vec<u8> {
    let mut w = ByteWriter::new();
    header(&mut w);
    color_map(&mut w, &[[255, 0, 0, 255], [0, 255, 0, 255]]);
    w.write_bytes(b"DATATREE");
    write_framed(&mut w, NODE_COMPOUND, |w| {
        matrix_body(w, "base", [0, 0, 0], [1, 1, 1], &[[0, 0, 0, 255]]);
        w.write_u32_le(1);
        matrix_node(w, "arm", [2, 0, 0], [1, 0, 0, 255]);
        Ok(())
    })
    .unwrap();
    w.into_inner()
}

#[test]
fn indexed_matrix() {
    let mut w = ByteWriter::new();
    header(&mut w);
    color_map(&mut w, &[[10, 10, 10, 255], [200, 100, 50, 255]]);
    w.write_bytes(b"DATATREE");
    write_framed(&mut w, NODE_MATRIX, |w| {
        // Y is innermost in storage order
        matrix_body(w, "m", [4, 5, 6], [1, 2, 1], &[[1, 0, 0, 255], [0, 0, 0, 0]]);
        Ok(())
    })
    .unwrap();

    let graph = load(w.as_slice(), &LoadOptions::default()).unwrap();
    let (id, node) = graph.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(volume.voxel([0, 0, 0]), Voxel::Generic(1));
    assert_eq!(volume.voxel([0, 1, 0]), Voxel::Air);
    assert_eq!(node.transform().translation, GridVector::new(4, 5, 6));
    assert_eq!(graph.resolved_palette(id).color(1), Rgba::rgb(200, 100, 50));
}

#[test]
fn true_color_matrix() {
    let mut w = ByteWriter::new();
    header(&mut w);
    color_map(&mut w, &[]);
    w.write_bytes(b"DATATREE");
    matrix_node(&mut w, "m", [0, 0, 0], [1, 2, 3, 255]);

    let graph = load(w.as_slice(), &LoadOptions::default()).unwrap();
    let (id, node) = graph.model_nodes().next().unwrap();
    let index = node.volume().unwrap().voxel([0, 0, 0]).color_index().unwrap();
    assert_eq!(graph.resolved_palette(id).color(index), Rgba::rgb(1, 2, 3));
}

#[test]
fn unknown_node_type_is_skipped() {
    let mut w = ByteWriter::new();
    header(&mut w);
    color_map(&mut w, &[[255, 255, 255, 255]]);
    w.write_bytes(b"DATATREE");
    write_framed(&mut w, NODE_MODEL, |w| {
        w.write_u32_le(2);
        w.write_u32_le(9);
        w.write_u32_le(3);
        w.write_bytes(&[0xAA, 0xBB, 0xCC]);
        matrix_node(w, "after", [0, 0, 0], [0, 0, 0, 255]);
        Ok(())
    })
    .unwrap();

    let graph = load(w.as_slice(), &LoadOptions::default()).unwrap();
    let names: Vec<&str> = graph.model_nodes().map(|(_, n)| n.name()).collect();
    assert_eq!(names, vec!["after"]);
}

#[test]
fn compound_children_kept() {
    let graph = load(&compound_file(), &LoadOptions::default()).unwrap();
    assert_eq!(graph.model_count(), 2);
    let (arm_id, arm) = graph.model_nodes().nth(1).unwrap();
    assert_eq!(arm.name(), "arm");
    assert_eq!(graph.world_translation(arm_id), Some(GridVector::new(2, 0, 0)));
}

#[test]
fn compound_children_merged() {
    let options = LoadOptions::default().with_merge_compounds(true);
    let graph = load(&compound_file(), &options).unwrap();
    assert_eq!(graph.model_count(), 1);
    let (_, node) = graph.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(
        volume.region(),
        Region::checked_from_lower_upper([0, 0, 0], [2, 0, 0]).unwrap()
    );
    assert_eq!(volume.voxel([0, 0, 0]), Voxel::Generic(0));
    assert_eq!(volume.voxel([1, 0, 0]), Voxel::Air);
    assert_eq!(volume.voxel([2, 0, 0]), Voxel::Generic(1));
}

/// A compound holding a compound at `position`, which holds a matrix at `position`.
fn nested_compound_file(position: i32) -> Vec<u8> {
    let mut w = ByteWriter::new();
    header(&mut w);
    color_map(&mut w, &[[255, 0, 0, 255]]);
    w.write_bytes(b"DATATREE");
    write_framed(&mut w, NODE_COMPOUND, |w| {
        matrix_body(w, "outer", [0, 0, 0], [1, 1, 1], &[[0, 0, 0, 255]]);
        w.write_u32_le(1);
        write_framed(w, NODE_COMPOUND, |w| {
            matrix_body(w, "inner", [position, 0, 0], [1, 1, 1], &[[0, 0, 0, 255]]);
            w.write_u32_le(1);
            matrix_node(w, "leaf", [position, 0, 0], [0, 0, 0, 255]);
            Ok(())
        })
    })
    .unwrap();
    w.into_inner()
}

#[test]
fn nested_translation_overflow_fails_to_save() {
    let graph = load(&nested_compound_file(i32::MAX), &LoadOptions::default()).unwrap();
    assert_eq!(graph.model_count(), 3);
    assert_eq!(save(&graph).unwrap_err().kind(), ErrorKind::MalformedStructure);
    assert_eq!(
        crate::Format::Qb
            .save(&graph, &crate::SaveOptions::default())
            .unwrap_err()
            .kind(),
        ErrorKind::MalformedStructure
    );
    assert_eq!(
        FormatError::from(graph.merge().unwrap_err()).kind(),
        ErrorKind::MalformedStructure
    );
}

#[test]
fn nested_translation_overflow_fails_to_merge() {
    let options = LoadOptions::default().with_merge_compounds(true);
    assert!(load(&nested_compound_file(i32::MAX), &options).is_err());
    // the same nesting within range loads
    let graph = load(&nested_compound_file(3), &options).unwrap();
    let (_, node) = graph.model_nodes().next().unwrap();
    assert_eq!(
        node.volume().unwrap().region(),
        Region::checked_from_lower_upper([0, 0, 0], [6, 0, 0]).unwrap()
    );
}

#[rstest]
#[case::magic(b"QB 3", 1, ErrorKind::InvalidMagic)]
#[case::version(b"QB 2", 2, ErrorKind::UnsupportedVersion)]
fn bad_header(#[case] magic: &[u8; 4], #[case] major: u8, #[case] kind: ErrorKind) {
    let mut w = ByteWriter::new();
    w.write_bytes(magic);
    w.write_u8(major);
    w.write_u8(0);
    assert_eq!(
        load(w.as_slice(), &LoadOptions::default()).unwrap_err().kind(),
        kind
    );
}

#[test]
fn unknown_section_is_malformed() {
    let mut w = ByteWriter::new();
    header(&mut w);
    w.write_bytes(b"SOMETHIN");
    assert_eq!(
        load(w.as_slice(), &LoadOptions::default()).unwrap_err().kind(),
        ErrorKind::MalformedStructure
    );
}

#[test]
fn empty_voxel_data_is_malformed() {
    let mut w = ByteWriter::new();
    header(&mut w);
    w.write_bytes(b"DATATREE");
    w.write_u32_le(NODE_MATRIX);
    w.write_u32_le(0);
    w.write_pascal_string_u32_le("m").unwrap();
    // position, scale, pivot and size
    for _ in 0..12 {
        w.write_u32_le(0);
    }
    w.write_u32_le(0);
    assert_eq!(
        load(w.as_slice(), &LoadOptions::default()).unwrap_err().kind(),
        ErrorKind::MalformedStructure
    );
}

#[test]
fn palette_only() {
    let mut w = ByteWriter::new();
    header(&mut w);
    color_map(&mut w, &[[1, 2, 3, 255], [4, 5, 6, 0]]);
    let palette = load_palette(w.as_slice()).unwrap();
    assert_eq!(palette.colors(), &[Rgba::rgb(1, 2, 3), Rgba::rgb(4, 5, 6)]);
}

fn model(region: Region, voxels: &[([i32; 3], u8)]) -> RawVolume {
    let mut volume = RawVolume::new(region).unwrap();
    for &(point, index) in voxels {
        volume.set_voxel(point, Voxel::Generic(index));
    }
    volume
}

fn sample_graph() -> SceneGraph {
    let palette =
        Palette::from_colors([Rgba::rgb(9, 9, 9), Rgba::rgb(80, 0, 0), Rgba::rgb(0, 0, 80)])
            .unwrap();
    let mut graph = SceneGraph::new();
    let group = graph.add_to_root(SceneNode::group("g"));
    let body = graph
        .add(
            SceneNode::model(
                "body",
                model(
                    Region::checked_from_lower_upper([-1, 0, 0], [1, 2, 0]).unwrap(),
                    &[([-1, 0, 0], 1), ([1, 2, 0], 2)],
                ),
            )
            .with_palette(palette.clone())
            .with_transform(Transform::from_translation(GridVector::new(3, 0, -2))),
            group,
        )
        .unwrap();
    graph
        .add(
            SceneNode::model(
                "hat",
                model(Region::ORIGIN_VOXEL, &[([0, 0, 0], 0)]),
            )
            .with_palette(palette)
            .with_transform(Transform::from_translation(GridVector::new(0, 3, 0))),
            body,
        )
        .unwrap();
    graph
}

#[test]
fn round_trip_preserves_indices_and_placement() {
    let graph = sample_graph();
    let loaded = load(&save(&graph).unwrap(), &LoadOptions::default()).unwrap();
    assert_eq!(loaded.model_count(), 2);

    for ((orig_id, orig), (id, node)) in graph.model_nodes().zip(loaded.model_nodes()) {
        assert_eq!(node.name(), orig.name());
        assert_eq!(loaded.world_region(id), graph.world_region(orig_id));
        let offset =
            graph.world_translation(orig_id).unwrap() - loaded.world_translation(id).unwrap();
        for (point, voxel) in orig.volume().unwrap().iter() {
            assert_eq!(node.volume().unwrap().voxel(point + offset), voxel, "at {point:?}");
        }
        assert_eq!(
            loaded.resolved_palette(id).colors(),
            graph.resolved_palette(orig_id).colors()
        );
    }
}

#[test]
fn model_with_children_is_saved_as_compound() {
    let bytes = save(&sample_graph()).unwrap();
    let r = &mut ByteReader::new(&bytes);
    read_header(r).unwrap();
    assert_eq!(&r.read_array::<8>().unwrap(), b"COLORMAP");
    let count = r.read_u32_le().unwrap();
    r.skip(count as usize * 4).unwrap();
    assert_eq!(&r.read_array::<8>().unwrap(), b"DATATREE");
    // the root and group each have a single child, so the tree starts at "body"
    assert_eq!(r.read_u32_le(), Ok(NODE_COMPOUND));
    let size = r.read_u32_le().unwrap();
    assert_eq!(size as usize, r.remaining());
}
