use pretty_assertions::assert_eq;

use voxfmt::math::Region;

use super::*;
use crate::ErrorKind;

fn sample_palette() -> Palette {
    Palette::from_colors((0..10).map(|i| Rgba::rgb(i * 20, 255 - i, 3))).unwrap()
}

fn sample_graph() -> SceneGraph {
    let mut body = RawVolume::new(Region::checked_from_size([2, 3, 4]).unwrap()).unwrap();
    body.set_voxel([0, 0, 0], Voxel::Generic(5));
    body.set_voxel([1, 2, 3], Voxel::Generic(7));
    body.set_voxel([1, 1, 0], Voxel::Generic(9));
    let mut turret = RawVolume::new(Region::ORIGIN_VOXEL).unwrap();
    turret.set_voxel([0, 0, 0], Voxel::Generic(1));

    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("body", body)
            .with_palette(sample_palette())
            .with_transform(Transform {
                translation: GridVector::new(10, -3, 4),
                pivot: GridVector::new(1, 2, 3),
            }),
    );
    graph.add_to_root(
        SceneNode::model("a turret with a long name", turret).with_palette(sample_palette()),
    );
    graph
}

#[test]
fn round_trip() {
    let graph = sample_graph();
    let bytes = save(&graph).unwrap();
    let loaded = load(&bytes).unwrap();
    assert_eq!(loaded.model_count(), 2);

    let mut models = loaded.model_nodes();
    let (body_id, body) = models.next().unwrap();
    assert_eq!(body.name(), "body");
    assert_eq!(
        body.transform(),
        Transform {
            translation: GridVector::new(10, -3, 4),
            pivot: GridVector::new(1, 2, 3),
        }
    );
    let volume = body.volume().unwrap();
    assert_eq!(volume.region(), Region::checked_from_size([2, 3, 4]).unwrap());
    assert_eq!(volume.solid_count(), 3);
    assert_eq!(volume.voxel([0, 0, 0]), Voxel::Generic(5));
    assert_eq!(volume.voxel([1, 2, 3]), Voxel::Generic(7));
    assert_eq!(volume.voxel([1, 1, 0]), Voxel::Generic(9));
    let palette = loaded.resolved_palette(body_id);
    assert_eq!(palette.color_count(), 256);
    assert_eq!(palette.color(7), Rgba::rgb(140, 248, 3));

    let (_, turret) = models.next().unwrap();
    assert_eq!(turret.name(), "a turret with a");
    assert_eq!(turret.volume().unwrap().voxel([0, 0, 0]), Voxel::Generic(1));
}

#[test]
fn body_size_is_patched() {
    let bytes = save(&sample_graph()).unwrap();
    let r = &mut ByteReader::new(&bytes);
    let header = read_header(r).unwrap();
    assert_eq!(header.layer_count, 2);
    let infos_start = HEADER_LEN + 2 * LAYER_HEADER_LEN + header.data_size as usize;
    // two infos of 92 bytes each follow the span data
    assert_eq!(bytes.len(), infos_start + 2 * 92);
}

#[test]
fn palette_only() {
    let bytes = save(&sample_graph()).unwrap();
    let palette = load_palette(&bytes).unwrap();
    assert_eq!(&palette.colors()[..10], sample_palette().colors());
    assert_eq!(palette.color(10), Rgba::BLACK);
}

#[test]
fn black_palette_falls_back_to_builtin() {
    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    w.write_u32_le(1);
    w.write_u32_le(0);
    w.write_u32_le(0);
    w.write_u32_le(0);
    w.write_bytes(&[16, 31]);
    w.write_bytes(&[0; 768]);
    assert_eq!(load_palette(w.as_slice()).unwrap(), Palette::builtin());
    assert_eq!(load(w.as_slice()).unwrap().model_count(), 0);
}

#[test]
fn wrong_magic() {
    let error = load(b"Voxel Animatio!\0").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidMagic);
}

#[test]
fn too_many_layers() {
    let mut w = ByteWriter::new();
    w.write_string(MAGIC);
    w.write_u32_le(1);
    w.write_u32_le(MAX_LAYERS + 1);
    w.write_u32_le(MAX_LAYERS + 1);
    w.write_u32_le(0);
    assert_eq!(
        load(w.as_slice()).unwrap_err().kind(),
        ErrorKind::SizeLimitExceeded
    );
}

#[test]
fn oversized_layer_is_not_saved() {
    let volume = RawVolume::new(Region::checked_from_size([1, 256, 1]).unwrap()).unwrap();
    let mut graph = SceneGraph::new();
    graph.add_to_root(SceneNode::model("tall", volume));
    assert_eq!(
        save(&graph).unwrap_err().kind(),
        ErrorKind::SizeLimitExceeded
    );
}

#[test]
fn column_with_gaps() {
    let mut volume = RawVolume::new(Region::checked_from_size([1, 6, 1]).unwrap()).unwrap();
    volume.set_voxel([0, 1, 0], Voxel::Generic(3));
    volume.set_voxel([0, 2, 0], Voxel::Generic(4));
    let mut out = ByteWriter::new();
    encode_column(&volume, 0, 0, &mut out);
    assert_eq!(out.as_slice(), &[1, 2, 3, 0, 4, 0, 2, 3, 0, 0]);
}
