use super::{FileInfo, Filesystem, clean_path};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

type FileTable = Rc<RefCell<BTreeMap<PathBuf, Vec<u8>>>>;

/// In-memory [`Filesystem`] for deterministic tests.
///
/// Paths are normalised with [`clean_path`], so `./map.tmx` and `map.tmx`
/// name the same file. Directories exist implicitly for every file and
/// explicitly after [`Filesystem::mkdir_all`].
#[derive(Debug, Default)]
pub struct MockFilesystem {
    files: FileTable,
    dirs: RefCell<BTreeSet<PathBuf>>,
    denied: RefCell<BTreeSet<PathBuf>>,
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `contents` at `path`, replacing any previous file.
    pub fn insert(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        self.files
            .borrow_mut()
            .insert(clean_path(path.as_ref()), contents.into());
    }

    /// Returns a copy of the file at `path`.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.borrow().get(&clean_path(path.as_ref())).cloned()
    }

    /// Returns the file at `path` decoded as UTF-8 (lossy).
    pub fn contents_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.contents(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.stat(path.as_ref()).is_ok()
    }

    /// Makes every later `create` of `path` fail with `PermissionDenied`.
    pub fn deny_writes(&self, path: impl AsRef<Path>) {
        self.denied.borrow_mut().insert(clean_path(path.as_ref()));
    }

    fn is_dir(&self, path: &Path) -> bool {
        if path == Path::new(".") || self.dirs.borrow().contains(path) {
            return true;
        }
        self.files
            .borrow()
            .keys()
            .any(|file| file.starts_with(path) && file != path)
    }
}

impl Filesystem for MockFilesystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let key = clean_path(path);
        match self.files.borrow().get(&key) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(not_found(&key)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let key = clean_path(path);
        if self.denied.borrow().contains(&key) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{}: permission denied", key.display()),
            ));
        }
        if self.is_dir(&key) {
            return Err(io::Error::other(format!(
                "{}: is a directory",
                key.display()
            )));
        }
        self.files.borrow_mut().insert(key.clone(), Vec::new());
        Ok(Box::new(MockWriter {
            files: Rc::clone(&self.files),
            path: key,
        }))
    }

    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let key = clean_path(path);
        if let Some(bytes) = self.files.borrow().get(&key) {
            return Ok(FileInfo {
                len: bytes.len() as u64,
                is_dir: false,
            });
        }
        if self.is_dir(&key) {
            return Ok(FileInfo {
                len: 0,
                is_dir: true,
            });
        }
        Err(not_found(&key))
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        let key = clean_path(path);
        if self.files.borrow().contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{}: file exists", key.display()),
            ));
        }
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in key.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }
}

/// Writer handed out by [`MockFilesystem::create`]; bytes land in the
/// shared file table as they are written.
struct MockWriter {
    files: FileTable,
    path: PathBuf,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.files
            .borrow_mut()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}
