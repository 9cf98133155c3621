use pretty_assertions::assert_eq;
use rstest::rstest;

use voxfmt::math::{Region, Rgba};
use voxfmt::{Palette, RawVolume, SceneGraph, SceneNode, Voxel};

use super::*;
use crate::file::NonDiskFile;

const ORANGE: Rgba = Rgba::rgb(200, 100, 40);

pub(crate) fn single_voxel_graph(index: u8) -> SceneGraph {
    let mut colors = vec![Rgba::rgb(1, 2, 3); usize::from(index)];
    colors.push(ORANGE);
    let mut volume = RawVolume::new(Region::ORIGIN_VOXEL).unwrap();
    volume.set_voxel([0, 0, 0], Voxel::Generic(index));
    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("voxel", volume).with_palette(Palette::from_colors(colors).unwrap()),
    );
    graph
}

#[test]
fn ids_are_unique_and_parse() {
    for format in Format::ALL {
        assert_eq!(format.id().parse::<Format>(), Ok(format));
        assert_eq!(format.to_string(), format.id());
        assert_eq!(
            Format::ALL.iter().filter(|other| other.id() == format.id()).count(),
            1
        );
    }
    assert_eq!("CNC-VXL".parse::<Format>(), Ok(Format::CncVxl));
    assert_eq!("vxr".parse::<Format>(), Ok(Format::Vxr));
    assert_eq!(
        "png".parse::<Format>(),
        Err(UnknownFormatName("png".to_owned()))
    );
}

#[rstest]
#[case("vox", Some(Format::Vox))]
#[case("QB", Some(Format::Qb))]
#[case("vxl", Some(Format::CncVxl))]
#[case("kvx", Some(Format::Kvx))]
#[case("qef", Some(Format::Qef))]
#[case("gox", None)]
#[case("xraw", None)]
#[case("mca", None)]
#[case("qbcl", None)]
#[case("vxr", None)]
#[case("", None)]
fn load_extensions(#[case] extension: &str, #[case] expected: Option<Format>) {
    assert_eq!(Format::from_extension(extension), expected);
}

#[rstest]
#[case("binvox", Some(Format::BinVox))]
#[case("Vxl", Some(Format::CncVxl))]
#[case("kvx", None)]
#[case("kv6", None)]
#[case("vxm", None)]
fn save_extensions(#[case] extension: &str, #[case] expected: Option<Format>) {
    assert_eq!(Format::for_save_extension(extension), expected);
}

#[test]
fn every_listed_extension_has_a_format() {
    for extension in LOAD_EXTENSIONS {
        let format = Format::from_extension(extension).unwrap();
        assert!(format.can_load(), "{format}");
    }
    for extension in SAVE_EXTENSIONS {
        let format = Format::for_save_extension(extension).unwrap();
        assert!(format.can_save(), "{format}");
    }
}

#[test]
fn unsaveable_formats() {
    let graph = single_voxel_graph(0);
    for format in [Format::Kvx, Format::Mcr] {
        assert!(!format.can_save());
        assert_eq!(
            format.save(&graph, &SaveOptions::default()).unwrap_err().kind(),
            ErrorKind::UnsupportedFeature
        );
    }
}

/// Saving and loading one voxel keeps it and its bounds. Formats marked as keeping the
/// color also reproduce its color exactly.
#[rstest]
#[case(Format::Vox, true)]
#[case(Format::Qbt, true)]
#[case(Format::Qb, true)]
#[case(Format::Qbcl, true)]
#[case(Format::Vxm, true)]
#[case(Format::BinVox, false)]
#[case(Format::Cub, true)]
#[case(Format::Kv6, false)]
#[case(Format::CncVxl, false)]
#[case(Format::Qef, false)]
#[case(Format::Gox, true)]
#[case(Format::XRaw, true)]
fn single_voxel_round_trip(
    #[case] format: Format,
    #[case] keeps_color: bool,
    #[values(0, 1, 254)] index: u8,
) {
    let graph = single_voxel_graph(index);
    let bytes = format.save(&graph, &SaveOptions::default()).unwrap();
    let loaded = format.load(&bytes, &LoadOptions::default()).unwrap();

    let merged = loaded.merge().unwrap().unwrap();
    assert_eq!(merged.volume.solid_count(), 1, "{format}");
    let (point, index) = merged.volume.solid_voxels().next().unwrap();
    assert_eq!(merged.volume.region(), Region::single(point), "{format}");
    if keeps_color {
        assert_eq!(merged.palette.color(index), ORANGE, "{format}");
    }
}

#[test]
fn rig_without_model_files() {
    let mut w = voxfmt::stream::ByteWriter::new();
    w.write_bytes(b"VXR4");
    w.write_i32_le(1);
    w.write_cstring("arm");
    w.write_cstring("arm.vxm");
    w.write_i32_le(0);
    let graph = Format::Vxr.load(w.as_slice(), &LoadOptions::default()).unwrap();
    assert_eq!(graph.model_count(), 0);
    assert_eq!(graph.len(), 2);
}

#[test]
fn load_palette_without_voxels() {
    let graph = single_voxel_graph(3);
    let bytes = Format::Qbt.save(&graph, &SaveOptions::default()).unwrap();
    let palette = Format::Qbt.load_palette(&bytes).unwrap();
    assert!(palette.colors().contains(&ORANGE));
}

#[test]
fn vxl_falls_back_to_ace_of_spades() {
    let map = Format::AosVxl
        .save(&single_voxel_graph(0), &SaveOptions::default())
        .unwrap();
    assert!(Format::CncVxl.load(&map, &LoadOptions::default()).is_err());

    let file = NonDiskFile::from_name_and_data_source("map.vxl".into(), move || Ok(map.clone()));
    let graph = load_volume_format(&file, &LoadOptions::default()).unwrap();
    let (_, node) = graph.model_nodes().next().unwrap();
    assert_eq!(
        node.volume().unwrap().region(),
        Region::checked_from_size([512, 64, 512]).unwrap()
    );
}

#[test]
fn vxl_fallback_reports_last_error() {
    let file = NonDiskFile::from_name_and_data_source("map.vxl".into(), || Ok(vec![1, 2, 3]));
    let error = load_volume_format(&file, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        error.detail(),
        ImportErrorKind::Parse {
            format: Format::AosVxl,
            ..
        }
    ));
    assert_eq!(error.kind(), Some(ErrorKind::Truncated));
}

#[test]
fn no_fallback_for_other_formats() {
    let error = load_volume_bytes(Format::Qb, &[1, 2, 3], &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        error,
        ImportErrorKind::Parse {
            format: Format::Qb,
            ..
        }
    ));
}
