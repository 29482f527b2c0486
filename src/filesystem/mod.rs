//! Filesystem collaborator.
//!
//! The scripter never touches `std::fs` directly: every map, script and
//! Host API file access goes through a [`Filesystem`]. The binary uses
//! [`RealFilesystem`]; tests use [`MockFilesystem`] for deterministic runs.

mod mock;
mod real;

pub use mock::MockFilesystem;
pub use real::RealFilesystem;

use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

/// Result of [`Filesystem::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub len: u64,
    pub is_dir: bool,
}

/// Minimal filesystem surface used by the scripter.
pub trait Filesystem {
    /// Opens an existing file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;

    /// Creates a file, truncating it if it already exists.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>>;

    /// Returns metadata for a file or directory, `NotFound` if absent.
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Creates a directory and all of its missing parents.
    fn mkdir_all(&self, path: &Path) -> io::Result<()>;
}

/// Folds `.` and `..` components without touching the filesystem.
///
/// A `..` that would climb above a relative path's start is kept, so
/// `../x` stays `../x`. An empty result becomes `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Resolves a Host API path against the directory containing the script.
///
/// The argument is always treated as relative: leading roots are dropped,
/// so `/data.json` and `data.json` name the same file. Traversal with `..`
/// is folded lexically but not prevented.
pub fn resolve_script_path(script_path: &Path, relative: &str) -> PathBuf {
    let script_dir = match script_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let relative: PathBuf = Path::new(relative)
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    clean_path(&script_dir.join(relative))
}

/// Opens `path` and reads it to the end.
pub fn read_all(fs: &dyn Filesystem, path: &Path) -> io::Result<Vec<u8>> {
    let mut contents = Vec::new();
    fs.open(path)?.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Creates or truncates `path` and writes `contents` in full.
pub fn write_all(fs: &dyn Filesystem, path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs.create(path)?;
    file.write_all(contents)?;
    file.flush()
}
