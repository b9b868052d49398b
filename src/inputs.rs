//! Sorting command-line paths into files to pack and packages to unpack.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extension that marks a file as a package rather than a source file.
pub const PACKAGE_EXTENSION: &str = "bin";

/// Command-line paths, classified.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Inputs {
    /// Source files to package, in argument order with directories expanded
    pub files: Vec<PathBuf>,
    /// Packages to unpack
    pub packages: Vec<PathBuf>,
    /// Arguments that are neither a file nor a directory
    pub missing: Vec<PathBuf>,
}

impl Inputs {
    pub fn classify<I, P>(args: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut inputs = Self::default();

        for arg in args {
            let path = arg.as_ref();
            if path.is_dir() {
                inputs.expand_dir(path);
            } else if path.is_file() {
                if is_package(path) {
                    inputs.packages.push(path.to_path_buf());
                } else {
                    inputs.files.push(path.to_path_buf());
                }
            } else {
                tracing::warn!("Skipping {}: no such file or directory", path.display());
                inputs.missing.push(path.to_path_buf());
            }
        }

        inputs
    }

    /// Add every regular file below `dir`, at any depth.
    ///
    /// Files found this way are always packed, whatever their extension.
    fn expand_dir(&mut self, dir: &Path) {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    self.files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Error walking {}: {}", dir.display(), e),
            }
        }
    }
}

/// True if `path` names a package by its extension. The match is exact, so
/// `PACKAGE.BIN` is packed like any other file.
pub fn is_package(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PACKAGE_EXTENSION)
}
