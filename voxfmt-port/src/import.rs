use std::io;

use voxfmt::{Palette, SceneGraph};

use crate::file::Fileish;
use crate::{ErrorKind, Format, FormatError, LoadOptions};

/// Load the model described by the given file, choosing the format by its extension.
///
/// A `.vxl` file is first decoded as [`Format::CncVxl`] and, if that fails, decoded again
/// from scratch as [`Format::AosVxl`]. The root of the returned graph is named after the
/// file, as by [`Fileish::document_name()`].
pub fn load_volume_format(
    file: &dyn Fileish,
    options: &LoadOptions,
) -> Result<SceneGraph, ImportError> {
    let format = format_for_file(file)?;
    load_volume_as(file, format, options)
}

/// Load the model described by the given file, which is in the given format.
///
/// Model files that a [`Format::Vxr`] rig refers to are read through
/// [`Fileish::read_sibling()`].
pub fn load_volume_as(
    file: &dyn Fileish,
    format: Format,
    options: &LoadOptions,
) -> Result<SceneGraph, ImportError> {
    let bytes = read_file(file)?;
    let result = match format {
        Format::Vxr => {
            crate::vxr::load(&bytes, |file_name: &str| file.read_sibling(file_name))
                .map_err(|error| ImportErrorKind::Parse { format, error })
        }
        _ => load_volume_bytes(format, &bytes, options),
    };
    let mut graph = result.map_err(|detail| ImportError {
        source_path: file.display_full_path(),
        detail,
    })?;
    if let Some(root) = graph.node_mut(SceneGraph::ROOT) {
        root.set_name(file.document_name());
    }
    Ok(graph)
}

/// Decodes `bytes` as `format`, falling back to the alternative format for ambiguous
/// extensions as [`load_volume_format()`] does.
pub fn load_volume_bytes(
    format: Format,
    bytes: &[u8],
    options: &LoadOptions,
) -> Result<SceneGraph, ImportErrorKind> {
    if !format.can_load() {
        return Err(ImportErrorKind::FormatDisabled { format });
    }
    match format.load(bytes, options) {
        Ok(graph) => Ok(graph),
        Err(error) => match format.load_fallback() {
            Some(fallback) => {
                log::warn!(
                    "could not load as {}, trying {}: {error}",
                    format.descriptive_name(),
                    fallback.descriptive_name()
                );
                // nothing from the failed attempt is kept
                fallback
                    .load(bytes, options)
                    .map_err(|error| ImportErrorKind::Parse {
                        format: fallback,
                        error,
                    })
            }
            None => Err(ImportErrorKind::Parse { format, error }),
        },
    }
}

/// Read only the colors of the given file, choosing the format by its extension.
pub fn load_palette(file: &dyn Fileish) -> Result<Palette, ImportError> {
    let format = format_for_file(file)?;
    let bytes = read_file(file)?;
    let result = format.load_palette(&bytes).or_else(|error| {
        match format.load_fallback() {
            Some(fallback) => fallback.load_palette(&bytes),
            None => Err(error),
        }
    });
    result.map_err(|error| ImportError {
        source_path: file.display_full_path(),
        detail: ImportErrorKind::Parse { format, error },
    })
}

fn format_for_file(file: &dyn Fileish) -> Result<Format, ImportError> {
    file.extension()
        .and_then(|extension| Format::from_extension(&extension))
        .ok_or_else(|| ImportError {
            source_path: file.display_full_path(),
            detail: ImportErrorKind::UnknownFormat {},
        })
}

fn read_file(file: &dyn Fileish) -> Result<Vec<u8>, ImportError> {
    file.read().map_err(|error| ImportError {
        source_path: file.display_full_path(),
        detail: ImportErrorKind::Read { path: None, error },
    })
}

/// Fatal errors that may be encountered during an import operation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
#[error("failed to import '{source_path}'")]
pub struct ImportError {
    /// The path, as produced by [`Fileish::display_full_path()`] or similar,
    /// of the file being imported.
    pub source_path: String,

    #[source]
    pub(crate) detail: ImportErrorKind,
}

impl ImportError {
    /// The specific reason for the failure.
    pub fn detail(&self) -> &ImportErrorKind {
        &self.detail
    }

    /// Classification of the decoding failure, if the failure was in decoding.
    pub fn kind(&self) -> Option<ErrorKind> {
        match &self.detail {
            ImportErrorKind::Parse { error, .. } => Some(error.kind()),
            _ => None,
        }
    }
}

/// Specific reason why an import operation failed.
/// Usually contained within an [`ImportError`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ImportErrorKind {
    /// An IO error occurred while reading the data to import.
    #[non_exhaustive]
    #[error("failed to read data from {path:?}")]
    Read {
        /// The path of the file which could not be read, if it is not identical to the
        /// [`ImportError::source_path`].
        path: Option<String>,

        /// The IO error that occurred while reading.
        error: io::Error,
    },

    /// The data was invalid as defined by the format.
    #[non_exhaustive]
    #[error("failed to parse the data as {}", .format.descriptive_name())]
    Parse {
        /// Format the data was parsed as.
        format: Format,
        /// Format-specific details of the parse error.
        #[source]
        error: FormatError,
    },

    /// The file name does not indicate a supported format.
    #[non_exhaustive]
    #[error("the data is not in a recognized format")]
    UnknownFormat {},

    /// The data is in a format whose import support was disabled at compilation time.
    #[non_exhaustive]
    #[error("support for importing {} was not compiled in", .format.descriptive_name())]
    FormatDisabled {
        /// Format that was requested.
        format: Format,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::NonDiskFile;
    use std::error::Error as _;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn error_is_send_sync() {
        assert_send_sync::<ImportError>();
    }

    #[test]
    fn import_unknown_extension() {
        let error = load_volume_format(
            &NonDiskFile::from_name_and_data_source("foo.txt".into(), || {
                Ok(b"nonsense".to_vec())
            }),
            &LoadOptions::default(),
        )
        .unwrap_err();

        assert_eq!(error.to_string(), "failed to import 'foo.txt'");
        assert_eq!(
            error.source().unwrap().to_string(),
            "the data is not in a recognized format"
        );
    }

    #[test]
    fn import_read_failure() {
        let error = load_volume_format(
            &NonDiskFile::from_name_and_data_source("foo.qb".into(), || {
                Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
            }),
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(error.detail(), ImportErrorKind::Read { .. }));
        assert_eq!(error.kind(), None);
    }

    #[test]
    fn root_is_named_after_file() {
        let bytes = Format::Qef
            .save(&crate::tests::single_voxel_graph(0), &crate::SaveOptions::default())
            .unwrap();
        let file = NonDiskFile::from_name_and_data_source("models/tree.qef".into(), move || {
            Ok(bytes.clone())
        });
        let graph = load_volume_format(&file, &LoadOptions::default()).unwrap();
        assert_eq!(graph.root().name(), "tree");
        let graph = load_volume_as(&file, Format::Qef, &LoadOptions::default()).unwrap();
        assert_eq!(graph.root().name(), "tree");
    }

    #[test]
    fn import_truncated() {
        let error = load_volume_format(
            &NonDiskFile::from_name_and_data_source("foo.qb".into(), || Ok(vec![3, 1])),
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::Truncated));
    }
}
