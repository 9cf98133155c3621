use clap::{CommandFactory as _, Parser as _};
use pretty_assertions::assert_eq;

use super::*;

fn parse(args: &[&str]) -> Result<ConvertArgs, clap::Error> {
    ConvertArgs::try_parse_from(std::iter::once("voxconvert").chain(args.iter().copied()))
}

#[test]
fn command_is_consistent() {
    ConvertArgs::command().debug_assert();
}

#[test]
fn minimal_conversion() {
    let args = parse(&["--input", "a.qb", "--output", "b.vox"]).unwrap();
    assert_eq!(args.input, PathBuf::from("a.qb"));
    assert_eq!(args.output, Some(PathBuf::from("b.vox")));
    assert!(!args.force);
    assert!(!args.palette_only);
    assert!(!args.logging.verbose);
    assert_eq!(args.input_format, None);
}

#[test]
fn all_options() {
    let args = parse(&[
        "-i",
        "a.bin",
        "-o",
        "b.bin",
        "-f",
        "-v",
        "--input-format",
        "QBCL",
        "--output-format",
        "aos-vxl",
        "--merge-compounds",
    ])
    .unwrap();
    assert!(args.force);
    assert!(args.logging.verbose);
    assert!(args.merge_compounds);
    assert_eq!(args.input_format, Some(Format::Qbcl));
    assert_eq!(args.output_format, Some(Format::AosVxl));
}

#[test]
fn output_is_required_for_conversion() {
    assert_eq!(
        parse(&["--input", "a.qb"]).unwrap_err().kind(),
        clap::error::ErrorKind::MissingRequiredArgument
    );
    let args = parse(&["--input", "a.qb", "--palette-only"]).unwrap();
    assert_eq!(args.output, None);
}

#[test]
fn palette_only_conflicts_with_output() {
    assert_eq!(
        parse(&["--input", "a.qb", "--output", "b.qb", "--palette-only"])
            .unwrap_err()
            .kind(),
        clap::error::ErrorKind::ArgumentConflict
    );
}

#[test]
fn unknown_format_name() {
    assert_eq!(
        parse(&["--input", "a", "--output", "b", "--input-format", "png"])
            .unwrap_err()
            .kind(),
        clap::error::ErrorKind::ValueValidation
    );
}

#[test]
fn format_help_lists_every_format() {
    for format in Format::ALL {
        assert!(FORMAT_HELP_LONG.contains(format.id()), "{format}");
    }
    assert!(FORMAT_HELP_LONG.contains("Minecraft region (load only)"));
    assert!(FORMAT_HELP_LONG.contains("\n* vox "));
}

#[test]
fn palette_listing() {
    let palette = Palette::from_colors([
        voxfmt::math::Rgba::new(255, 0, 16, 255),
        voxfmt::math::Rgba::new(1, 2, 3, 4),
    ])
    .unwrap();
    let mut out = Vec::new();
    write_palette(&palette, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "  0 #ff0010ff\n  1 #01020304\n"
    );
}
