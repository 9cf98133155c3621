//! The `voxconvert` tool: converts a voxel model file from one format to another, or
//! prints its palette.
//!
//! The binary is a thin wrapper around [`run()`], which is public so that it can be
//! tested without spawning processes.

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;

use voxfmt::Palette;
use voxfmt_port::{Format, LoadOptions, SaveOptions};

pub mod logging;
use logging::LoggingArgs;

#[cfg(test)]
mod tests;

/// Command-line arguments of `voxconvert`.
#[derive(Clone, Debug, clap::Parser)]
#[command(name = "voxconvert", author, about, version)]
pub struct ConvertArgs {
    /// Model file to read.
    ///
    /// Unless --input-format is given, the format is chosen by the file name extension.
    #[arg(long = "input", short = 'i', value_name = "FILE")]
    pub input: PathBuf,

    /// File to write the converted model to.
    ///
    /// Unless --output-format is given, the format is chosen by the file name extension,
    /// and unrecognized extensions are written as Qubicle Binary.
    #[arg(
        long = "output",
        short = 'o',
        value_name = "FILE",
        required_unless_present = "palette_only"
    )]
    pub output: Option<PathBuf>,

    /// Overwrite the output file if it already exists.
    #[arg(long = "force", short = 'f')]
    pub force: bool,

    /// Format of the input file, overriding its extension.
    #[arg(
        long = "input-format",
        value_name = "FORMAT",
        long_help = &**FORMAT_HELP_LONG,
    )]
    pub input_format: Option<Format>,

    /// Format of the output file, overriding its extension.
    #[arg(
        long = "output-format",
        value_name = "FORMAT",
        long_help = &**FORMAT_HELP_LONG,
    )]
    pub output_format: Option<Format>,

    /// Flatten Qubicle compound nodes and their children into single models.
    #[arg(long = "merge-compounds")]
    pub merge_compounds: bool,

    /// Print the colors of the input file's palette instead of converting it.
    #[arg(long = "palette-only", conflicts_with = "output")]
    pub palette_only: bool,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub logging: LoggingArgs,
}

/// clap doesn't list the values of a [`std::str::FromStr`] argument, so do it ourselves.
static FORMAT_HELP_LONG: LazyLock<String> = LazyLock::new(|| {
    let max_width = Format::ALL
        .iter()
        .map(|format| format.id().len())
        .max()
        .unwrap_or(0);

    let mut text = String::from("One of the following format names:\n");
    for format in Format::ALL {
        let access = match (format.can_load(), format.can_save()) {
            (true, true) => "",
            (true, false) => " (load only)",
            (false, true) => " (save only)",
            (false, false) => " (not available)",
        };
        // writing to a String cannot fail
        let _ = write!(
            text,
            "\n* {:max_width$} — {}{access}",
            format.id(),
            format.descriptive_name()
        );
    }
    text
});

/// Performs the conversion or palette listing requested by `args`.
///
/// Palette listings are written to `out`; everything else is reported through [`log`].
pub fn run(args: &ConvertArgs, out: &mut dyn io::Write) -> Result<(), anyhow::Error> {
    let input = args.input.as_path();

    if args.palette_only {
        let palette = read_palette(input, args.input_format)?;
        write_palette(&palette, out)?;
        return Ok(());
    }

    let output = args
        .output
        .as_deref()
        .context("an output file is required unless --palette-only is given")?;
    if output.exists() && !args.force {
        anyhow::bail!(
            "'{}' already exists; use --force to overwrite it",
            output.display()
        );
    }

    let load_options = LoadOptions::default().with_merge_compounds(args.merge_compounds);
    let graph = match args.input_format {
        Some(format) => voxfmt_port::load_volume_as(&args.input, format, &load_options)?,
        None => voxfmt_port::load_volume_format(&args.input, &load_options)?,
    };
    log::info!(
        "read {models} models from '{input}'",
        models = graph.model_count(),
        input = input.display()
    );

    let save_options = SaveOptions::default();
    let format = match args.output_format {
        Some(format) => voxfmt_port::save_volume_as(output, format, &graph, &save_options)
            .map(|()| format),
        None => voxfmt_port::save_volume_format(output, &graph, &save_options),
    }
    .with_context(|| format!("failed to export '{}'", output.display()))?;
    log::info!(
        "wrote '{output}' as {format}",
        output = output.display(),
        format = format.descriptive_name()
    );
    Ok(())
}

fn read_palette(input: &Path, format: Option<Format>) -> Result<Palette, anyhow::Error> {
    Ok(match format {
        Some(format) => {
            let bytes = fs::read(input)
                .with_context(|| format!("failed to read '{}'", input.display()))?;
            format
                .load_palette(&bytes)
                .with_context(|| format!("failed to import '{}'", input.display()))?
        }
        None => voxfmt_port::load_palette(&input.to_path_buf())?,
    })
}

/// Writes one line per palette entry: the index, then the color as `#rrggbbaa`.
fn write_palette(palette: &Palette, out: &mut dyn io::Write) -> Result<(), io::Error> {
    for (index, color) in palette.colors().iter().enumerate() {
        let [r, g, b, a] = color.to_array();
        writeln!(out, "{index:3} #{r:02x}{g:02x}{b:02x}{a:02x}")?;
    }
    out.flush()
}
