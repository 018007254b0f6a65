//! Synthetic metadata and directory handles
//!
//! The composition layer fabricates entries that exist in no backing
//! source: the merge root, the mount-key names, and container files that
//! are presented as directories. These types produce them.

use std::io::{self, Read};

use crate::error::{Result, VfsError};
use crate::filesystem::{DirEntry, File, FileType, Metadata, ReadDir};
use crate::path;

/// Mode reported for virtual directories
pub const VIRTUAL_DIR_MODE: u32 = 0o555;

/// Metadata that overrides only the name of an optional delegate.
///
/// With a delegate, size, mode, mtime and directory-ness come from it. Without
/// one, the entry looks like an empty read-only directory.
#[derive(Debug, Clone)]
pub struct SyntheticFileInfo {
    display_path: String,
    delegate: Option<Metadata>,
}

impl SyntheticFileInfo {
    pub fn new(display_path: impl Into<String>, delegate: Option<Metadata>) -> Self {
        Self {
            display_path: display_path.into(),
            delegate,
        }
    }

    /// A virtual directory with no backing metadata
    pub fn directory(display_path: impl Into<String>) -> Self {
        Self::new(display_path, None)
    }

    /// The full composed path this info was created for
    pub fn path(&self) -> &str {
        &self.display_path
    }

    pub fn name(&self) -> &str {
        path::base(&self.display_path)
    }

    pub fn is_dir(&self) -> bool {
        self.delegate.as_ref().map_or(true, Metadata::is_dir)
    }

    pub fn metadata(&self) -> Metadata {
        match &self.delegate {
            Some(delegate) => Metadata {
                name: self.name().to_string(),
                ..delegate.clone()
            },
            None => Metadata {
                name: self.name().to_string(),
                file_type: FileType::Directory,
                size: 0,
                mtime: None,
                mode: Some(VIRTUAL_DIR_MODE),
            },
        }
    }
}

impl From<SyntheticFileInfo> for Metadata {
    fn from(info: SyntheticFileInfo) -> Self {
        info.metadata()
    }
}

/// Directory entry built from a [`SyntheticFileInfo`]
pub struct SyntheticDirEntry;

impl SyntheticDirEntry {
    pub fn from_info(info: &SyntheticFileInfo) -> DirEntry {
        DirEntry::new(info.metadata())
    }

    /// Entry that presents `name` as a virtual directory
    pub fn directory(name: &str) -> DirEntry {
        Self::from_info(&SyntheticFileInfo::directory(name))
    }
}

/// In-memory directory handle over a fixed list of entries
#[derive(Debug)]
pub struct SyntheticDirectory {
    info: SyntheticFileInfo,
    entries: Vec<DirEntry>,
    offset: usize,
}

impl SyntheticDirectory {
    pub fn new(info: SyntheticFileInfo, entries: Vec<DirEntry>) -> Self {
        Self {
            info,
            entries,
            offset: 0,
        }
    }

    /// Number of entries not yet returned
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.offset
    }
}

impl Read for SyntheticDirectory {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

impl ReadDir for SyntheticDirectory {
    fn read_dir(&mut self, count: usize) -> Result<Vec<DirEntry>> {
        let mut n = self.remaining();
        if count > 0 && n > count {
            n = count;
        }
        if n == 0 {
            if count == 0 {
                return Ok(Vec::new());
            }
            return Err(VfsError::EndOfStream);
        }

        let list = self.entries[self.offset..self.offset + n].to_vec();
        self.offset += n;
        Ok(list)
    }
}

impl File for SyntheticDirectory {
    fn stat(&self) -> Result<Metadata> {
        Ok(self.info.metadata())
    }

    fn as_read_dir(&mut self) -> Option<&mut dyn ReadDir> {
        Some(self)
    }
}
