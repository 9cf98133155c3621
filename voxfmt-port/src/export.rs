use std::fs;
use std::io;
use std::path::Path;

use voxfmt::SceneGraph;

use crate::{ErrorKind, Format, FormatError, SaveOptions};

/// Returns the format [`save_volume_format()`] uses for `path`: the one matching its
/// extension if that is in [`SAVE_EXTENSIONS`](crate::SAVE_EXTENSIONS), otherwise
/// [`Format::Qb`].
pub fn format_for_save_path(path: &Path) -> Format {
    let format = path
        .extension()
        .and_then(|e| Format::for_save_extension(&e.to_string_lossy()));
    match format {
        Some(format) => format,
        None => {
            log::warn!(
                "no save format for {}, saving as {}",
                path.display(),
                Format::Qb.descriptive_name()
            );
            Format::Qb
        }
    }
}

/// Save `graph` to a file on disk, choosing the format by the extension of `destination`
/// as described in [`format_for_save_path()`].
///
/// Returns the format that was used. On failure, the destination may have been
/// partially written and should be discarded.
pub fn save_volume_format(
    destination: &Path,
    graph: &SceneGraph,
    options: &SaveOptions,
) -> Result<Format, ExportError> {
    let format = format_for_save_path(destination);
    save_volume_as(destination, format, graph, options)?;
    Ok(format)
}

/// Save `graph` to a file on disk in the given format.
///
/// A [`Format::Vxr`] rig also writes one [`Format::Vxm`] file per model node into the
/// directory of `destination`, named after the rig and the node.
pub fn save_volume_as(
    destination: &Path,
    format: Format,
    graph: &SceneGraph,
    options: &SaveOptions,
) -> Result<(), ExportError> {
    if format == Format::Vxr {
        return save_rig(destination, graph);
    }
    let bytes = save_volume_bytes(format, graph, options)?;
    fs::write(destination, bytes)?;
    Ok(())
}

fn save_rig(destination: &Path, graph: &SceneGraph) -> Result<(), ExportError> {
    let encode_error = |error| ExportError::Encode {
        format: Format::Vxr,
        error,
    };
    if graph.is_empty() {
        return Err(encode_error(FormatError::EmptyScene));
    }
    let stem = destination
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let rig = crate::vxr::save(graph, &stem).map_err(encode_error)?;
    for (file_name, bytes) in &rig.models {
        fs::write(destination.with_file_name(file_name), bytes)?;
    }
    fs::write(destination, &rig.bytes)?;
    log::info!(
        "Saved {format}: {len} bytes and {models} model files",
        format = Format::Vxr.descriptive_name(),
        len = rig.bytes.len(),
        models = rig.models.len()
    );
    Ok(())
}

/// Encodes `graph` in the given format, in memory.
pub fn save_volume_bytes(
    format: Format,
    graph: &SceneGraph,
    options: &SaveOptions,
) -> Result<Vec<u8>, ExportError> {
    format.save(graph, options).map_err(|error| match error {
        FormatError::Disabled { format } => ExportError::FormatDisabled { format },
        error => ExportError::Encode { format, error },
    })
}

/// Fatal errors that may be encountered during an export operation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExportError {
    /// IO error while writing the data to a file or stream.
    #[error("could not write export data")]
    Write(#[from] io::Error),

    /// The data is in a format whose export support was disabled at compilation time.
    #[non_exhaustive]
    #[error("support for exporting {} was not compiled in", .format.descriptive_name())]
    FormatDisabled {
        /// Format that was requested.
        format: Format,
    },

    /// The scene could not be represented in the requested [`Format`].
    #[non_exhaustive]
    #[error("could not convert data to {format}", format = .format.descriptive_name())]
    Encode {
        /// Format that was requested.
        format: Format,
        /// Format-specific details.
        #[source]
        error: FormatError,
    },
}

impl ExportError {
    /// Classification of the encoding failure, if the failure was in encoding.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ExportError::Encode { error, .. } => Some(error.kind()),
            _ => None,
        }
    }
}
