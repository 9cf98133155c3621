use pretty_assertions::assert_eq;

use voxfmt::math::Region;
use voxfmt::{RawVolume, SceneNode};

use super::*;
use crate::ErrorKind;

const RED: Rgba = Rgba::rgb(255, 0, 0);
const BLUE: Rgba = Rgba::rgb(0, 0, 255);

#[test]
fn short_file_is_truncated() {
    assert_eq!(load(&[0, 5, 5]).unwrap_err().kind(), ErrorKind::Truncated);

    // one complete column, then nothing
    let mut w = ByteWriter::new();
    write_column(&[None, Some(RED)], &mut w);
    assert_eq!(load(w.as_slice()).unwrap_err().kind(), ErrorKind::Truncated);
}

#[test]
fn slab5_is_unsupported() {
    let mut bytes = vec![0x00, 0x20, 0x07, 0x09];
    bytes.extend([0; 100]);
    assert_eq!(
        load(&bytes).unwrap_err().kind(),
        ErrorKind::UnsupportedFeature
    );
}

#[test]
fn column_encoding() {
    let mut w = ByteWriter::new();
    write_column(&[None, Some(RED), None, Some(BLUE)], &mut w);
    assert_eq!(
        w.as_slice(),
        &[2, 1, 1, 0, 0, 0, 255, 255, 0, 3, 3, 2, 255, 0, 0, 255]
    );
}

#[test]
fn hidden_and_bottom_colors() {
    let c1 = Rgba::rgb(1, 2, 3);
    let c2 = Rgba::rgb(4, 5, 6);
    let c3 = Rgba::rgb(7, 8, 9);
    let mut w = ByteWriter::new();
    w.write_bytes(&[3, 1, 1, 0]);
    w.write_bytes(&[3, 2, 1, 0]);
    w.write_bytes(&[6, 5, 4, 0]);
    w.write_bytes(&[0, 6, 6, 5]);
    w.write_bytes(&[9, 8, 7, 0]);

    let mut cells = Vec::new();
    read_column(&mut ByteReader::new(w.as_slice()), &mut cells, 7).unwrap();
    assert_eq!(
        cells,
        vec![
            (7, Cell::Colored { z: 1, color: c1 }),
            (7, Cell::Hidden { top: 2, bottom: Some(4) }),
            (7, Cell::Colored { z: 4, color: c2 }),
            (7, Cell::Colored { z: 6, color: c3 }),
            (7, Cell::Hidden { top: 7, bottom: None }),
        ]
    );
}

#[test]
fn span_too_short_for_its_colors() {
    let mut w = ByteWriter::new();
    w.write_bytes(&[1, 0, 1, 0]);
    w.write_bytes(&[0; 8]);
    let error = read_column(&mut ByteReader::new(w.as_slice()), &mut Vec::new(), 0).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedStructure);
}

#[test]
fn map_heights() {
    assert_eq!(map_height(0).unwrap(), 64);
    assert_eq!(map_height(63).unwrap(), 64);
    assert_eq!(map_height(64).unwrap(), 128);
    assert_eq!(map_height(255).unwrap(), 256);
    assert_eq!(
        map_height(256).unwrap_err().kind(),
        ErrorKind::SizeLimitExceeded
    );
}

#[test]
fn round_trip() {
    let palette = Palette::from_colors([RED, BLUE]).unwrap();
    let mut volume = RawVolume::new(Region::checked_from_size([2, 3, 1]).unwrap()).unwrap();
    volume.set_voxel([0, 0, 0], Voxel::Generic(0));
    volume.set_voxel([1, 2, 0], Voxel::Generic(1));
    let mut graph = SceneGraph::new();
    graph.add_to_root(SceneNode::model("m", volume).with_palette(palette));

    let loaded = load(&save(&graph).unwrap()).unwrap();
    let (id, node) = loaded.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(
        volume.region(),
        Region::checked_from_size([512, 64, 512]).unwrap()
    );
    let palette = loaded.resolved_palette(id);
    let color_at = |point: [i32; 3]| match volume.voxel(point) {
        Voxel::Air => None,
        Voxel::Generic(index) => Some(palette.color(index)),
    };
    assert_eq!(color_at([0, 0, 0]), Some(RED));
    assert_eq!(color_at([1, 2, 0]), Some(BLUE));
    assert_eq!(color_at([1, 1, 0]), None);
    // the floor is filled everywhere
    assert!(color_at([300, 0, 20]).is_some());
    assert_eq!(color_at([300, 1, 20]), None);
    assert_eq!(volume.solid_count(), 512 * 512 + 1);
}

#[test]
fn too_tall_to_save() {
    let mut volume = RawVolume::new(Region::checked_from_size([1, 257, 1]).unwrap()).unwrap();
    volume.set_voxel([0, 256, 0], Voxel::Generic(0));
    let mut graph = SceneGraph::new();
    graph.add_to_root(SceneNode::model("m", volume));
    assert_eq!(
        save(&graph).unwrap_err().kind(),
        ErrorKind::SizeLimitExceeded
    );
}
