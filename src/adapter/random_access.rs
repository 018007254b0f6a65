//! Random access over sequential-only handles
//!
//! Bytes pulled from the source are teed into a scratch file. Positional
//! reads are served from that file after draining the source far enough, so
//! memory use stays bounded by the drain buffer no matter how large the
//! stream is.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use scopeguard::ScopeGuard;
use tempfile::TempPath;
use tracing::{debug, trace, warn};

use crate::adapter::recursive::FsFactory;
use crate::error::{Result, VfsError};
use crate::filesystem::dir::read_full_at;
use crate::filesystem::{File, Filesystem, Metadata, ReadAt};
use crate::path;

/// Prefix of every scratch file created by the spool
pub const SPOOL_PREFIX: &str = "dtr_tmp";

/// Upper bound on the buffer used when draining the source
const DRAIN_CHUNK: usize = 32 * 1024;

struct Spool {
    source: Box<dyn File>,
    file: fs::File,
    /// Bytes pulled from the source and written to `file`
    consumed: u64,
    exhausted: bool,
    /// Set once a spool write fails; the spool no longer mirrors the source
    poisoned: Option<(io::ErrorKind, String)>,
}

impl Spool {
    fn check_poisoned(&self) -> io::Result<()> {
        match &self.poisoned {
            None => Ok(()),
            Some((kind, msg)) => Err(io::Error::new(
                *kind,
                format!("spool unusable after earlier write failure: {}", msg),
            )),
        }
    }

    /// Read from the source and append what was read to the spool
    fn tee(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_poisoned()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.source.read(buf)?;
        if n == 0 {
            self.exhausted = true;
            return Ok(0);
        }
        if let Err(e) = self.file.write_all(&buf[..n]) {
            warn!("Spool write failed after {} bytes: {}", self.consumed, e);
            self.poisoned = Some((e.kind(), e.to_string()));
            return Err(e);
        }
        self.consumed += n as u64;
        Ok(n)
    }

    /// Pull bytes through the tee until `target` bytes are spooled or the
    /// source ends. End of stream is not an error here.
    fn drain_to(&mut self, target: u64) -> io::Result<()> {
        if self.consumed >= target || self.exhausted {
            return Ok(());
        }
        let mut scratch = vec![0u8; DRAIN_CHUNK.min((target - self.consumed) as usize)];
        while self.consumed < target && !self.exhausted {
            let want = scratch.len().min((target - self.consumed) as usize);
            match self.tee(&mut scratch[..want]) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                }
                Err(e) => return Err(e),
            }
        }
        trace!("Spool drained to {} bytes (target {})", self.consumed, target);
        Ok(())
    }
}

/// Sequential handle upgraded with positional reads through a disk spool
pub struct RandomAccessFile {
    state: Mutex<Spool>,
    spool_path: TempPath,
}

impl RandomAccessFile {
    /// Wrap `source`, creating an empty scratch file in `scratch_dir`.
    ///
    /// An empty `scratch_dir` means the system temporary directory. When
    /// the scratch file cannot be created, `source` is closed before the
    /// error is returned.
    pub fn new(source: Box<dyn File>, scratch_dir: &Path) -> Result<Self> {
        let source = scopeguard::guard(source, |source| {
            if let Err(e) = source.close() {
                warn!("Failed to close source after spool setup error: {}", e);
            }
        });

        let dir = scratch_dir_or_default(scratch_dir);
        let named = tempfile::Builder::new()
            .prefix(SPOOL_PREFIX)
            .tempfile_in(&dir)
            .map_err(|e| VfsError::io("spool", dir.to_string_lossy(), e))?;
        let (file, spool_path) = named.into_parts();
        debug!("Spooling sequential handle to {:?}", spool_path);

        Ok(Self {
            state: Mutex::new(Spool {
                source: ScopeGuard::into_inner(source),
                file,
                consumed: 0,
                exhausted: false,
                poisoned: None,
            }),
            spool_path,
        })
    }

    /// Location of the scratch file backing this handle
    pub fn spool_path(&self) -> &Path {
        &self.spool_path
    }

    /// Bytes consumed from the source so far
    pub fn consumed(&self) -> u64 {
        self.state.lock().consumed
    }
}

fn scratch_dir_or_default(scratch_dir: &Path) -> PathBuf {
    if scratch_dir.as_os_str().is_empty() {
        std::env::temp_dir()
    } else {
        scratch_dir.to_path_buf()
    }
}

impl Read for RandomAccessFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.state.get_mut().tee(buf)
    }
}

impl ReadAt for RandomAccessFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut spool = self.state.lock();
        spool.check_poisoned()?;
        let end = offset.saturating_add(buf.len() as u64);
        if end > spool.consumed {
            spool.drain_to(end)?;
        }
        read_full_at(&spool.file, buf, offset)
    }
}

impl File for RandomAccessFile {
    fn stat(&self) -> Result<Metadata> {
        self.state.lock().source.stat()
    }

    /// Close the source, then delete the scratch file even if that failed.
    fn close(self: Box<Self>) -> Result<()> {
        let RandomAccessFile { state, spool_path } = *self;
        let Spool { source, file, .. } = state.into_inner();
        drop(file);

        let display = spool_path.to_string_lossy().into_owned();
        let closed = source.close();
        let cleanup = spool_path.close();
        match (closed, cleanup) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(c)) => Err(VfsError::io("remove", display, c)),
            (Err(e), Err(c)) => Err(VfsError::Close {
                close: Box::new(e),
                cleanup: c,
            }),
        }
    }

    fn as_read_at(&self) -> Option<&dyn ReadAt> {
        Some(self)
    }
}

/// Filesystem wrapper that spools every sequential-only file it opens.
///
/// Directories and handles that already read at offsets pass through.
pub struct RandomAccessFilesystem {
    inner: Arc<dyn Filesystem>,
    scratch_dir: PathBuf,
}

impl RandomAccessFilesystem {
    pub fn new(inner: Arc<dyn Filesystem>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

impl Filesystem for RandomAccessFilesystem {
    fn open(&self, name: &str) -> Result<Box<dyn File>> {
        if !path::valid_path(name) {
            return Err(VfsError::invalid_path("open", name));
        }

        let file = self.inner.open(name)?;
        let stat = match file.stat() {
            Ok(stat) => stat,
            Err(e) => {
                if let Err(ce) = file.close() {
                    warn!("Failed to close {} after stat error: {}", name, ce);
                }
                return Err(e);
            }
        };

        if stat.is_dir() || file.as_read_at().is_some() {
            return Ok(file);
        }

        trace!("Wrapping {} for random access", name);
        Ok(Box::new(RandomAccessFile::new(file, &self.scratch_dir)?))
    }
}

/// Wrap a container factory so the filesystems it builds spool their files too.
///
/// Members of one container can then be opened as containers themselves by
/// factories that need positional reads.
pub fn spooling_factory(factory: FsFactory, scratch_dir: impl Into<PathBuf>) -> FsFactory {
    let scratch_dir = scratch_dir.into();
    Arc::new(move |file: Box<dyn File>| -> Result<Arc<dyn Filesystem>> {
        let inner = factory(file)?;
        Ok(Arc::new(RandomAccessFilesystem::new(
            inner,
            scratch_dir.clone(),
        )))
    })
}
