//! In-memory filesystem
//!
//! An immutable tree assembled up front with [`MemoryFsBuilder`]. Used for
//! synthetic sources and throughout the tests.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{Result, VfsError};
use crate::filesystem::tree::{Node, Tree};
use crate::filesystem::{File, Filesystem, Metadata, ReadAt};
use crate::path;
use crate::synthetic::{SyntheticDirectory, SyntheticFileInfo};

/// In-memory filesystem.
///
/// Contents are shared between handles and never copied on open.
pub struct MemoryFs {
    tree: Tree<Arc<[u8]>>,
    sequential: bool,
}

impl MemoryFs {
    pub fn builder() -> MemoryFsBuilder {
        MemoryFsBuilder::default()
    }

    /// Number of files and directories, including the root
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.len() <= 1
    }
}

/// Builder for [`MemoryFs`]
#[derive(Default)]
pub struct MemoryFsBuilder {
    files: Vec<(String, Vec<u8>)>,
    dirs: Vec<String>,
    mtime: Option<SystemTime>,
    sequential: bool,
}

impl MemoryFsBuilder {
    pub fn file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), data.into()));
        self
    }

    pub fn dir(mut self, path: impl Into<String>) -> Self {
        self.dirs.push(path.into());
        self
    }

    /// Modification time reported for every node
    pub fn mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Hand out forward-only file handles without positional reads
    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    pub fn build(self) -> Result<MemoryFs> {
        let mut tree = Tree::new(self.mtime);
        for dir in &self.dirs {
            if !path::valid_path(dir) {
                return Err(VfsError::invalid_path("mkdir", dir.as_str()));
            }
            tree.insert_dir(dir, self.mtime)?;
        }
        for (name, data) in self.files {
            if !path::valid_path(&name) {
                return Err(VfsError::invalid_path("create", name));
            }
            let info = Metadata::file(path::base(&name), data.len() as u64, self.mtime);
            tree.insert_file(&name, info, Arc::from(data))?;
        }
        Ok(MemoryFs {
            tree,
            sequential: self.sequential,
        })
    }
}

impl Filesystem for MemoryFs {
    fn open(&self, name: &str) -> Result<Box<dyn File>> {
        if !path::valid_path(name) {
            return Err(VfsError::invalid_path("open", name));
        }

        match self.tree.get(name) {
            None => Err(VfsError::not_found("open", name)),
            Some(Node::Dir { info, .. }) => {
                let entries = self.tree.listing(name).unwrap_or_default();
                let info = SyntheticFileInfo::new(name, Some(info.clone()));
                Ok(Box::new(SyntheticDirectory::new(info, entries)))
            }
            Some(Node::File { info, payload }) => {
                let file = MemFile {
                    info: info.clone(),
                    data: Arc::clone(payload),
                    pos: 0,
                };
                if self.sequential {
                    Ok(Box::new(SequentialMemFile(file)))
                } else {
                    Ok(Box::new(file))
                }
            }
        }
    }
}

struct MemFile {
    info: Metadata,
    data: Arc<[u8]>,
    pos: usize,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let n = buf.len().min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl ReadAt for MemFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

impl File for MemFile {
    fn stat(&self) -> Result<Metadata> {
        Ok(self.info.clone())
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        Some(self)
    }
}

/// Forward-only view of an in-memory file
struct SequentialMemFile(MemFile);

impl Read for SequentialMemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl File for SequentialMemFile {
    fn stat(&self) -> Result<Metadata> {
        self.0.stat()
    }
}
