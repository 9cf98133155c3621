use pretty_assertions::assert_eq;

use voxfmt::math::Region;
use voxfmt::{Palette, RawVolume};

use super::*;
use crate::ErrorKind;

const RED: Rgba = Rgba::rgb(255, 0, 0);

/// A SLAB5 file (no palette) of one column, 2 high, with the given voxels.
fn slab5_column(records: &[(Rgba, u8)], column_len: u16) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    for s in [1, 1, 2] {
        w.write_u32_le(s);
    }
    for p in [0.0, 0.0, 0.0] {
        w.write_f32_le(p);
    }
    w.write_u32_le(records.len() as u32);
    for &(color, z) in records {
        w.write_bytes(&[color.b(), color.g(), color.r(), 0, z, 0, 0, 0]);
    }
    w.write_u32_le(u32::from(column_len));
    w.write_u16_le(column_len);
    w.into_inner()
}

#[test]
fn slab5_colors_build_a_palette() {
    let blue = Rgba::rgb(0, 0, 200);
    let graph = load(&slab5_column(&[(RED, 0), (blue, 1)], 2)).unwrap();
    let (id, node) = graph.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(volume.region(), Region::checked_from_size([1, 2, 1]).unwrap());
    assert_eq!(volume.voxel([0, 1, 0]), Voxel::Generic(0));
    assert_eq!(volume.voxel([0, 0, 0]), Voxel::Generic(1));
    assert_eq!(graph.resolved_palette(id).colors(), &[RED, blue]);
}

#[test]
fn columns_claim_missing_voxels() {
    let error = load(&slab5_column(&[(RED, 0)], 2)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedStructure);
}

#[test]
fn voxel_below_the_bottom() {
    let error = load(&slab5_column(&[(RED, 2)], 1)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedStructure);
}

#[test]
fn wrong_magic() {
    assert_eq!(load(b"Kvx!").unwrap_err().kind(), ErrorKind::InvalidMagic);
}

#[test]
fn too_many_voxels() {
    let mut bytes = slab5_column(&[], 0);
    bytes[28..32].copy_from_slice(&(MAX_VOXELS + 1).to_le_bytes());
    assert_eq!(
        load(&bytes).unwrap_err().kind(),
        ErrorKind::SizeLimitExceeded
    );
}

#[test]
fn interior_is_not_saved() {
    let mut volume = RawVolume::new(Region::checked_from_size([3, 3, 3]).unwrap()).unwrap();
    for point in volume.region().iter() {
        volume.set_voxel(point, Voxel::Generic(0));
    }
    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("cube", volume).with_palette(Palette::from_colors([RED]).unwrap()),
    );
    let loaded = load(&save(&graph).unwrap()).unwrap();
    let (id, node) = loaded.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(volume.solid_count(), 26);
    assert_eq!(volume.voxel([1, 1, 1]), Voxel::Air);
    assert_eq!(loaded.resolved_palette(id).color(0), RED);
}

#[test]
fn round_trip() {
    let palette = Palette::from_colors([RED, Rgba::rgb(10, 20, 30)]).unwrap();
    let region = Region::checked_from_lower_size([5, 5, 5], [2, 1, 1]).unwrap();
    let mut volume = RawVolume::new(region).unwrap();
    volume.set_voxel([5, 5, 5], Voxel::Generic(0));
    volume.set_voxel([6, 5, 5], Voxel::Generic(1));
    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("m", volume)
            .with_palette(palette)
            .with_transform(Transform {
                pivot: GridVector::new(1, 0, 0),
                ..Transform::IDENTITY
            }),
    );

    let bytes = save(&graph).unwrap();
    assert_eq!(&bytes[bytes.len() - 772..bytes.len() - 768], PALETTE_MAGIC);
    let loaded = load(&bytes).unwrap();
    let (id, node) = loaded.model_nodes().next().unwrap();
    let volume = node.volume().unwrap();
    assert_eq!(volume.voxel([0, 0, 0]), Voxel::Generic(0));
    assert_eq!(volume.voxel([1, 0, 0]), Voxel::Generic(1));
    assert_eq!(node.transform().pivot, GridVector::new(1, 0, 0));
    // the suggested palette has 6-bit precision
    assert_eq!(loaded.resolved_palette(id).color(1), Rgba::rgb(8, 20, 28));
}
