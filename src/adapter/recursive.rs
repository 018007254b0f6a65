//! Transparent descent into container files
//!
//! A path such as `a/b.zip/c/d.txt` is resolved by opening `a/b.zip` on the
//! root filesystem, handing that handle to the factory registered for
//! `.zip`, and opening `c/d.txt` on the result. Containers nest to any depth.
//! Constructed filesystems are memoized by their full path from the root.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Result, VfsError};
use crate::filesystem::{DirEntry, File, Filesystem, Metadata, ReadAt, ReadDir};
use crate::path;
use crate::synthetic::{SyntheticDirEntry, SyntheticFileInfo};

/// Builds a filesystem from an opened container handle.
///
/// The factory takes ownership of the handle.
pub type FsFactory = Arc<dyn Fn(Box<dyn File>) -> Result<Arc<dyn Filesystem>> + Send + Sync>;

/// Extension (with the leading dot) to container factory
pub type FactoryRegistry = HashMap<String, FsFactory>;

fn container_factory<'a>(name: &str, factories: &'a FactoryRegistry) -> Option<&'a FsFactory> {
    let ext = path::ext(name);
    if ext.is_empty() {
        None
    } else {
        factories.get(ext)
    }
}

fn is_container(name: &str, factories: &FactoryRegistry) -> bool {
    container_factory(name, factories).is_some()
}

/// Filesystem that mounts container files found along a path
pub struct RecursiveMountFilesystem {
    root: Arc<dyn Filesystem>,
    factories: Arc<FactoryRegistry>,
    instances: RwLock<HashMap<String, Arc<dyn Filesystem>>>,
}

impl RecursiveMountFilesystem {
    pub fn new(root: Arc<dyn Filesystem>, factories: FactoryRegistry) -> Self {
        Self {
            root,
            factories: Arc::new(factories),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Number of container filesystems built so far
    pub fn cached_instances(&self) -> usize {
        self.instances.read().len()
    }

    /// Filesystem mounted from the container at `name`.
    ///
    /// `"."` yields the root filesystem. A final segment without a
    /// registered factory fails with [`VfsError::FactoryNotFound`].
    pub fn open_container(&self, name: &str) -> Result<Arc<dyn Filesystem>> {
        if !path::valid_path(name) {
            return Err(VfsError::invalid_path("open", name));
        }

        let (fs, local) = self.resolve(name)?;
        if local == path::ROOT {
            return Ok(fs);
        }
        Err(VfsError::FactoryNotFound {
            path: name.to_string(),
            discriminator: path::ext(name).to_string(),
        })
    }

    /// Walk `name`, mounting every container along the way. Returns the
    /// innermost filesystem and the path left to open on it.
    fn resolve(&self, name: &str) -> Result<(Arc<dyn Filesystem>, String)> {
        let mut current = Arc::clone(&self.root);
        let mut full = path::ROOT.to_string();
        let mut local = path::ROOT.to_string();
        if name == path::ROOT {
            return Ok((current, local));
        }

        for segment in name.split('/') {
            full = path::join(&full, segment);
            local = path::join(&local, segment);
            let Some(factory) = container_factory(segment, &self.factories) else {
                continue;
            };
            current = self.instance(&current, &full, &local, factory)?;
            local = path::ROOT.to_string();
        }
        Ok((current, local))
    }

    /// Get the filesystem for the container at `full_path`, building it from
    /// `local_path` on `parent` when it is not cached yet.
    fn instance(
        &self,
        parent: &Arc<dyn Filesystem>,
        full_path: &str,
        local_path: &str,
        factory: &FsFactory,
    ) -> Result<Arc<dyn Filesystem>> {
        if let Some(fs) = self.instances.read().get(full_path) {
            trace!("Container {} served from cache", full_path);
            return Ok(Arc::clone(fs));
        }

        let container = parent.open(local_path)?;
        let fs = factory(container)?;
        debug!("Mounted container {}", full_path);

        // a concurrent first open may have raced us here; the later insert wins
        self.instances
            .write()
            .insert(full_path.to_string(), Arc::clone(&fs));
        Ok(fs)
    }
}

impl Filesystem for RecursiveMountFilesystem {
    fn open(&self, name: &str) -> Result<Box<dyn File>> {
        if !path::valid_path(name) {
            return Err(VfsError::invalid_path("open", name));
        }

        let (current, local) = self.resolve(name)?;
        trace!("Opening {} as {} on innermost filesystem", name, local);
        let inner = current.open(&local)?;
        Ok(Box::new(RecursiveFile {
            name: name.to_string(),
            inner,
            factories: Arc::clone(&self.factories),
        }))
    }
}

/// Handle returned by [`RecursiveMountFilesystem`]
///
/// Reports the full requested path as its name and lists container files
/// as directories.
struct RecursiveFile {
    name: String,
    inner: Box<dyn File>,
    factories: Arc<FactoryRegistry>,
}

impl Read for RecursiveFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl ReadDir for RecursiveFile {
    fn read_dir(&mut self, count: usize) -> Result<Vec<DirEntry>> {
        let dir = self
            .inner
            .as_read_dir()
            .ok_or_else(|| VfsError::not_a_directory("readdir", self.name.as_str()))?;

        let entries = dir.read_dir(count)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                if is_container(entry.name(), &self.factories) {
                    SyntheticDirEntry::directory(entry.name())
                } else {
                    entry
                }
            })
            .collect())
    }
}

impl File for RecursiveFile {
    fn stat(&self) -> Result<Metadata> {
        let stat = self.inner.stat()?;
        Ok(SyntheticFileInfo::new(self.name.as_str(), Some(stat)).metadata())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.inner.close()
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        self.inner.as_read_at()
    }

    fn as_read_dir(&mut self) -> Option<&mut dyn ReadDir> {
        if self.inner.as_read_dir().is_some() {
            Some(self)
        } else {
            None
        }
    }
}
