pub mod cursor;
pub mod dir;
pub mod memory;
pub(crate) mod tree;
#[cfg(feature = "zip")]
pub mod zip;

use std::io::{self, Read};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{Result, VfsError};

/// File type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// Default file mode (r--r--r--)
pub const DEFAULT_FILE_MODE: u32 = 0o444;
/// Default directory mode (r-xr-xr-x)
pub const DEFAULT_DIR_MODE: u32 = 0o555;

/// Metadata for a file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Base name as reported by the source
    pub name: String,
    pub file_type: FileType,
    pub size: u64,
    pub mtime: Option<SystemTime>,
    /// POSIX permission bits (e.g., 0o644). None means use default.
    pub mode: Option<u32>,
}

impl Metadata {
    pub fn file(name: impl Into<String>, size: u64, mtime: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::File,
            size,
            mtime,
            mode: None,
        }
    }

    pub fn directory(name: impl Into<String>, mtime: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Directory,
            size: 0,
            mtime,
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Get the mode, using defaults if not set
    pub fn mode_or_default(&self) -> u32 {
        self.mode.unwrap_or(if self.is_dir() {
            DEFAULT_DIR_MODE
        } else {
            DEFAULT_FILE_MODE
        })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }
}

/// Directory entry returned by [`ReadDir::read_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    info: Metadata,
}

impl DirEntry {
    pub fn new(info: Metadata) -> Self {
        Self { info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn file_type(&self) -> FileType {
        self.info.file_type
    }

    pub fn is_dir(&self) -> bool {
        self.info.is_dir()
    }

    pub fn info(&self) -> &Metadata {
        &self.info
    }
}

/// Positional reads that do not disturb the sequential read position.
///
/// A short count means the end of the data was reached.
pub trait ReadAt: Send + Sync {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl<R: ReadAt + ?Sized> ReadAt for Arc<R> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

/// Paginated directory listing
pub trait ReadDir {
    /// Return up to `count` entries, advancing an internal cursor.
    ///
    /// With `count > 0`, an exhausted listing fails with
    /// [`VfsError::EndOfStream`]. With `count == 0` every remaining entry is
    /// returned, and an exhausted listing yields an empty list.
    fn read_dir(&mut self, count: usize) -> Result<Vec<DirEntry>>;
}

/// An open file handle.
///
/// Optional capabilities are exposed through the `as_*` views and must be
/// tested for at the point of use.
pub trait File: Read + Send + Sync {
    fn stat(&self) -> Result<Metadata>;

    /// Release the handle and everything it holds.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        None
    }

    fn as_read_dir(&mut self) -> Option<&mut dyn ReadDir> {
        None
    }
}

/// Core filesystem trait
///
/// Every source and every adapter is addressed through `open`. Paths are
/// validated with [`crate::path::valid_path`].
pub trait Filesystem: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn File>>;

    /// Get metadata for a path
    ///
    /// Default implementation opens the path and stats the handle
    fn stat(&self, path: &str) -> Result<Metadata> {
        let file = self.open(path)?;
        let stat = file.stat();
        let closed = file.close();
        let stat = stat?;
        closed?;
        Ok(stat)
    }

    /// Check if a path exists
    fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<F: Filesystem + ?Sized> Filesystem for Arc<F> {
    fn open(&self, path: &str) -> Result<Box<dyn File>> {
        (**self).open(path)
    }

    fn stat(&self, path: &str) -> Result<Metadata> {
        (**self).stat(path)
    }
}

/// Read every entry of a directory handle
pub fn read_dir_all(file: &mut dyn File, path: &str) -> Result<Vec<DirEntry>> {
    let dir = file
        .as_read_dir()
        .ok_or_else(|| VfsError::not_a_directory("readdir", path))?;
    dir.read_dir(0)
}

/// Open `path` and read it to the end
pub fn read_to_vec(fs: &dyn Filesystem, path: &str) -> Result<Vec<u8>> {
    let mut file = fs.open(path)?;
    let mut data = Vec::new();
    let read = file
        .read_to_end(&mut data)
        .map_err(|e| VfsError::io("read", path, e));
    let closed = file.close();
    read?;
    closed?;
    Ok(data)
}
