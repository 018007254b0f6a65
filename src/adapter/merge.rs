//! Keyed union of filesystems
//!
//! Each mounted filesystem is addressed as `<key>/<path>`. The root is a
//! synthesized directory listing the keys in insertion order.

use std::io::{self, Read};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::error::{Result, VfsError};
use crate::filesystem::{DirEntry, File, Filesystem, Metadata, ReadAt, ReadDir};
use crate::path;
use crate::synthetic::{SyntheticDirEntry, SyntheticDirectory, SyntheticFileInfo};

/// A (key, filesystem) pair registered with a [`MergeFilesystem`]
#[derive(Clone)]
pub struct Mount {
    pub key: String,
    pub fs: Arc<dyn Filesystem>,
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount").field("key", &self.key).finish()
    }
}

/// Union of keyed filesystems.
///
/// Routing is ordered: the first mount whose key prefixes the path gets the
/// open, and a not-found answer moves on to the next matching mount.
#[derive(Default)]
pub struct MergeFilesystem {
    mounts: RwLock<Vec<Mount>>,
}

impl std::fmt::Debug for MergeFilesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeFilesystem")
            .field("mounts", &self.mounts())
            .finish()
    }
}

impl MergeFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mount. Keys are not checked for uniqueness.
    pub fn add(&self, key: impl Into<String>, fs: Arc<dyn Filesystem>) {
        let key = key.into();
        debug!("Adding mount {:?}", key);
        self.mounts.write().push(Mount { key, fs });
    }

    /// Remove the first mount with `key`.
    ///
    /// Returns `true` if a mount was removed, `false` if nothing was mounted there.
    pub fn remove(&self, key: &str) -> bool {
        let mut mounts = self.mounts.write();
        match mounts.iter().position(|m| m.key == key) {
            Some(pos) => {
                mounts.remove(pos);
                debug!("Removed mount {:?}", key);
                true
            }
            None => false,
        }
    }

    /// Keys of the current mounts, in order
    pub fn mounts(&self) -> Vec<String> {
        self.mounts.read().iter().map(|m| m.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.mounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.read().is_empty()
    }

    /// Build the root listing from the current mounts
    fn root_dir(mounts: &[Mount]) -> Result<Box<dyn File>> {
        let mut entries = Vec::with_capacity(mounts.len());
        for mount in mounts {
            let stat = mount.fs.stat(path::ROOT)?;
            entries.push(SyntheticDirEntry::from_info(&SyntheticFileInfo::new(
                mount.key.as_str(),
                Some(stat),
            )));
        }
        Ok(Box::new(SyntheticDirectory::new(
            SyntheticFileInfo::directory(path::ROOT),
            entries,
        )))
    }

    fn open_mount_root(mount: &Mount, name: &str) -> Result<Box<dyn File>> {
        let mut root = mount.fs.open(path::ROOT)?;
        if root.as_read_dir().is_none() {
            if let Err(e) = root.close() {
                warn!("Failed to close root of mount {:?}: {}", mount.key, e);
            }
            return Err(VfsError::not_a_directory("open", name));
        }
        Ok(Box::new(MountRoot {
            key: mount.key.clone(),
            inner: root,
        }))
    }
}

impl Filesystem for MergeFilesystem {
    fn open(&self, name: &str) -> Result<Box<dyn File>> {
        if !path::valid_path(name) {
            return Err(VfsError::invalid_path("open", name));
        }

        let mounts = self.mounts.read();

        if name == path::ROOT {
            return Self::root_dir(&mounts);
        }

        for mount in mounts.iter() {
            if name == mount.key {
                return Self::open_mount_root(mount, name);
            }

            let Some(rest) = name
                .strip_prefix(mount.key.as_str())
                .and_then(|r| r.strip_prefix('/'))
            else {
                continue;
            };

            trace!("Routing {} to mount {:?} as {}", name, mount.key, rest);
            match mount.fs.open(rest) {
                Err(e) if e.is_not_found() => {
                    trace!("Mount {:?} has no {}, trying next", mount.key, rest);
                    continue;
                }
                other => return other,
            }
        }

        Err(VfsError::not_found("open", name))
    }
}

/// Root of a mount, reporting the mount key as its name
struct MountRoot {
    key: String,
    inner: Box<dyn File>,
}

impl Read for MountRoot {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl ReadDir for MountRoot {
    fn read_dir(&mut self, count: usize) -> Result<Vec<DirEntry>> {
        match self.inner.as_read_dir() {
            Some(dir) => dir.read_dir(count),
            None => Err(VfsError::not_a_directory("readdir", self.key.as_str())),
        }
    }
}

impl File for MountRoot {
    fn stat(&self) -> Result<Metadata> {
        let stat = self.inner.stat()?;
        Ok(SyntheticFileInfo::new(self.key.as_str(), Some(stat)).metadata())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.inner.close()
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        self.inner.as_read_at()
    }

    fn as_read_dir(&mut self) -> Option<&mut dyn ReadDir> {
        Some(self)
    }
}
