//! File system abstraction, for loading models that do not necessarily
//! live on the file system that [`std::fs`] accesses.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

/// A “file” that we can load things from and which has a name,
/// without being tied to the current OS file system.
pub trait Fileish: fmt::Debug + Send + Sync {
    /// Name of the file without directories or extension, for display purposes
    /// such as naming the root of a loaded scene.
    fn document_name(&self) -> String;

    /// Path of the file, for display purposes such as in an error, not a path that can
    /// necessarily be opened.
    fn display_full_path(&self) -> String;

    /// File name extension without the dot, used to choose the [`Format`](crate::Format).
    fn extension(&self) -> Option<String>;

    /// Obtains the file contents.
    fn read(&self) -> Result<Vec<u8>, io::Error>;

    /// Obtains the contents of another file in the same directory, for formats which
    /// refer to other files by name.
    ///
    /// The default implementation has no siblings and fails with
    /// [`io::ErrorKind::NotFound`].
    fn read_sibling(&self, file_name: &str) -> Result<Vec<u8>, io::Error> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{file_name:?} is not available next to {}", self.display_full_path()),
        ))
    }
}

/// Whether `file_name` names a file without reaching into any other directory.
fn is_plain_file_name(file_name: &str) -> bool {
    let mut components = Path::new(file_name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl Fileish for PathBuf {
    fn document_name(&self) -> String {
        match self.file_stem() {
            Some(n) => n.to_string_lossy(),
            None => self.to_string_lossy(),
        }
        .into_owned()
    }

    fn display_full_path(&self) -> String {
        self.display().to_string()
    }

    fn extension(&self) -> Option<String> {
        Path::extension(self).map(|e| e.to_string_lossy().into_owned())
    }

    fn read(&self) -> Result<Vec<u8>, io::Error> {
        std::fs::read(self)
    }

    fn read_sibling(&self, file_name: &str) -> Result<Vec<u8>, io::Error> {
        if !is_plain_file_name(file_name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{file_name:?} is not a plain file name"),
            ));
        }
        std::fs::read(self.with_file_name(file_name))
    }
}

/// General-purpose implementation of [`Fileish`], whose contents come from a function.
pub struct NonDiskFile<O> {
    name: String,
    opener: O,
}

impl<O> fmt::Debug for NonDiskFile<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { name, opener: _ } = self;
        f.debug_struct("NonDiskFile")
            .field("name", name)
            .finish_non_exhaustive()
    }
}

impl<O> NonDiskFile<O> {
    /// Construct a new [`NonDiskFile`] from its parts.
    ///
    /// `name` is used for display and, through its extension if it has one, for choosing
    /// the format.
    pub fn from_name_and_data_source(name: String, opener: O) -> Self {
        Self { name, opener }
    }
}

impl<O> Fileish for NonDiskFile<O>
where
    O: Fn() -> Result<Vec<u8>, io::Error> + Send + Sync,
{
    fn document_name(&self) -> String {
        PathBuf::from(&self.name).document_name()
    }

    fn display_full_path(&self) -> String {
        self.name.clone()
    }

    fn extension(&self) -> Option<String> {
        Fileish::extension(&PathBuf::from(&self.name))
    }

    fn read(&self) -> Result<Vec<u8>, io::Error> {
        (self.opener)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn path_names() {
        let path = PathBuf::from("models/castle.QB");
        assert_eq!(path.document_name(), "castle");
        assert_eq!(Fileish::extension(&path).as_deref(), Some("QB"));
    }

    #[test]
    fn non_disk_file() {
        let file = NonDiskFile::from_name_and_data_source("dir/thing.vxl".into(), || {
            Ok(vec![1, 2, 3])
        });
        assert_eq!(file.document_name(), "thing");
        assert_eq!(file.display_full_path(), "dir/thing.vxl");
        assert_eq!(file.extension().as_deref(), Some("vxl"));
        assert_eq!(file.read().unwrap(), vec![1, 2, 3]);
        assert_eq!(
            file.read_sibling("other.vxm").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn path_siblings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part.vxm"), [7]).unwrap();
        let path = dir.path().join("rig.vxr");
        assert_eq!(path.read_sibling("part.vxm").unwrap(), vec![7]);
        assert_eq!(
            path.read_sibling("missing.vxm").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        for name in ["../part.vxm", "/etc/passwd", "a/part.vxm", ""] {
            assert_eq!(
                path.read_sibling(name).unwrap_err().kind(),
                io::ErrorKind::InvalidInput,
                "{name}"
            );
        }
    }
}
