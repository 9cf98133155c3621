use std::io;

use voxfmt::math::RegionError;
use voxfmt::stream::StreamError;
use voxfmt::{PaletteError, SceneGraphError, VolumeError};

use crate::Format;

/// Error from decoding or encoding one file in one [`Format`].
///
/// Use [`FormatError::kind()`] to classify it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FormatError {
    /// Reading or writing the byte stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The file does not start with the signature of the format.
    #[error("expected file signature {expected:?}, found {found:?}")]
    InvalidMagic {
        /// The signature the format requires.
        expected: &'static str,
        /// What the file contained instead, escaped for display.
        found: String,
    },

    /// The file declares a version of the format that is not supported.
    #[error("unsupported {what} version {version}")]
    UnsupportedVersion {
        /// Which version field was checked.
        what: &'static str,
        /// The version found.
        version: u32,
    },

    /// Counts, sizes or offsets in the file are inconsistent with each other.
    #[error("malformed file: {0}")]
    Malformed(String),

    /// A declared dimension or count exceeds what the format permits.
    #[error("{what} of {value} exceeds the maximum of {max}")]
    SizeLimit {
        /// What was measured.
        what: &'static str,
        /// The declared value.
        value: u64,
        /// The largest accepted value.
        max: u64,
    },

    /// The data is valid but uses something this library cannot represent.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A compressed section could not be decompressed.
    #[error("could not decompress data")]
    Compression(#[source] io::Error),

    /// An encoder reported failure while producing the file contents.
    #[error("could not write encoded data")]
    Write(#[source] io::Error),

    /// An embedded image could not be decoded or encoded.
    #[cfg(feature = "gox")]
    #[error("could not process embedded image")]
    Image(#[from] image::ImageError),

    /// The scene to be saved contains no models.
    #[error("scene contains no models")]
    EmptyScene,

    /// Support for the format was disabled at compile time.
    #[error("support for {} was not compiled in", .format.descriptive_name())]
    Disabled {
        /// Format that was requested.
        format: Format,
    },

    /// A volume could not be allocated.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// A region could not be represented.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// A palette could not hold the file's colors.
    #[error(transparent)]
    Palette(#[from] PaletteError),

    /// A scene node could not be attached.
    #[error(transparent)]
    SceneGraph(#[from] SceneGraphError),
}

/// Classification of a [`FormatError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The data ended before a required field or block.
    Truncated,
    /// The header identifies a file this codec cannot parse.
    InvalidMagic,
    /// The header declares a version this codec cannot parse.
    UnsupportedVersion,
    /// Internal counts or sizes are inconsistent.
    MalformedStructure,
    /// Declared dimensions or counts exceed the format's caps.
    SizeLimitExceeded,
    /// Valid data that cannot be represented, or a disabled format.
    UnsupportedFeature,
}

impl FormatError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormatError::Stream(StreamError::Truncated { .. }) => ErrorKind::Truncated,
            FormatError::Stream(_) => ErrorKind::MalformedStructure,
            FormatError::InvalidMagic { .. } => ErrorKind::InvalidMagic,
            FormatError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            FormatError::Malformed(_) => ErrorKind::MalformedStructure,
            FormatError::SizeLimit { .. } => ErrorKind::SizeLimitExceeded,
            FormatError::Unsupported(_) => ErrorKind::UnsupportedFeature,
            FormatError::Compression(_) => ErrorKind::MalformedStructure,
            FormatError::Write(_) => ErrorKind::MalformedStructure,
            #[cfg(feature = "gox")]
            FormatError::Image(_) => ErrorKind::MalformedStructure,
            FormatError::EmptyScene => ErrorKind::UnsupportedFeature,
            FormatError::Disabled { .. } => ErrorKind::UnsupportedFeature,
            FormatError::Volume(VolumeError::Region(_)) => ErrorKind::MalformedStructure,
            FormatError::Volume(_) => ErrorKind::SizeLimitExceeded,
            FormatError::Region(_) => ErrorKind::MalformedStructure,
            FormatError::Palette(_) => ErrorKind::UnsupportedFeature,
            FormatError::SceneGraph(_) => ErrorKind::MalformedStructure,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        FormatError::Malformed(message.into())
    }

    /// Checks a file signature.
    pub(crate) fn check_magic(expected: &'static str, found: &[u8]) -> Result<(), Self> {
        if found == expected.as_bytes() {
            Ok(())
        } else {
            Err(FormatError::InvalidMagic {
                expected,
                found: found.escape_ascii().to_string(),
            })
        }
    }

    /// Fails with [`FormatError::SizeLimit`] if `value` exceeds `max`.
    pub(crate) fn check_limit(
        what: &'static str,
        value: impl Into<u64>,
        max: impl Into<u64>,
    ) -> Result<(), Self> {
        let (value, max) = (value.into(), max.into());
        if value > max {
            Err(FormatError::SizeLimit { what, value, max })
        } else {
            Ok(())
        }
    }
}
