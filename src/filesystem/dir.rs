//! Directory-backed filesystem
//!
//! A read-only view of an on-disk directory tree. Regular files support
//! positional reads natively, so they never need the random-access spool.

use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{Result, VfsError};
use crate::filesystem::{DirEntry, File, Filesystem, Metadata, ReadAt, ReadDir};
use crate::path;
use crate::synthetic::{SyntheticDirectory, SyntheticFileInfo};

/// Filesystem rooted at a local directory
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        if name == path::ROOT {
            self.root.clone()
        } else {
            self.root.join(name)
        }
    }
}

fn to_metadata(name: &str, md: &fs::Metadata) -> Metadata {
    let base = path::base(name).to_string();
    let mode = md.permissions().mode() & 0o7777;
    let mtime = md.modified().ok();
    if md.is_dir() {
        Metadata::directory(base, mtime).with_mode(mode)
    } else {
        Metadata::file(base, md.len(), mtime).with_mode(mode)
    }
}

/// A missing target, or a file standing where a directory was expected, is not-found
fn map_io(op: &'static str, name: &str, err: io::Error) -> VfsError {
    if err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(libc::ENOTDIR) {
        VfsError::not_found(op, name)
    } else {
        VfsError::io(op, name, err)
    }
}

impl Filesystem for DirFs {
    fn open(&self, name: &str) -> Result<Box<dyn File>> {
        if !path::valid_path(name) {
            return Err(VfsError::invalid_path("open", name));
        }

        let full = self.resolve(name);
        let md = fs::metadata(&full).map_err(|e| map_io("open", name, e))?;
        let info = to_metadata(name, &md);

        if md.is_dir() {
            let mut entries = Vec::new();
            for entry in fs::read_dir(&full).map_err(|e| map_io("readdir", name, e))? {
                let entry = entry.map_err(|e| VfsError::io("readdir", name, e))?;
                let child_name = entry.file_name().to_string_lossy().into_owned();
                let child_md = entry
                    .metadata()
                    .map_err(|e| VfsError::io("readdir", name, e))?;
                entries.push(DirEntry::new(to_metadata(&child_name, &child_md)));
            }
            entries.sort_by(|a, b| a.name().cmp(b.name()));
            trace!("Listed {} entries under {:?}", entries.len(), full);

            let info = SyntheticFileInfo::new(name, Some(info));
            return Ok(Box::new(DirHandle {
                listing: SyntheticDirectory::new(info, entries),
            }));
        }

        let file = fs::File::open(&full).map_err(|e| map_io("open", name, e))?;
        Ok(Box::new(OsFile {
            name: name.to_string(),
            info,
            file,
        }))
    }
}

/// Open a single local file as a handle with native positional reads
pub fn open_local(file_path: &Path) -> Result<Box<dyn File>> {
    let display = file_path.to_string_lossy().into_owned();
    let file = fs::File::open(file_path).map_err(|e| map_io("open", &display, e))?;
    let md = file.metadata().map_err(|e| VfsError::io("stat", display.as_str(), e))?;
    if md.is_dir() {
        return Err(VfsError::io(
            "open",
            display,
            io::Error::new(io::ErrorKind::Other, "is a directory"),
        ));
    }
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());
    Ok(Box::new(OsFile {
        info: to_metadata(&name, &md),
        name: display,
        file,
    }))
}

/// Regular file on disk
struct OsFile {
    name: String,
    info: Metadata,
    file: fs::File,
}

impl Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl ReadAt for OsFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_full_at(&self.file, buf, offset)
    }
}

impl File for OsFile {
    fn stat(&self) -> Result<Metadata> {
        let md = self
            .file
            .metadata()
            .map_err(|e| VfsError::io("stat", self.name.as_str(), e))?;
        Ok(to_metadata(&self.info.name, &md))
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        Some(self)
    }
}

/// Directory on disk, listed once at open time
struct DirHandle {
    listing: SyntheticDirectory,
}

impl Read for DirHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.listing.read(buf)
    }
}

impl File for DirHandle {
    fn stat(&self) -> Result<Metadata> {
        self.listing.stat()
    }

    fn as_read_dir(&mut self) -> Option<&mut dyn ReadDir> {
        Some(&mut self.listing)
    }
}

/// Positional read that keeps going until `buf` is full or the file ends
pub(crate) fn read_full_at(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read_at(&mut buf[total..], offset + total as u64) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
