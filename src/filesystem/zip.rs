//! Zip archive filesystem
//!
//! Reads the central directory once, then serves members by path. Directory
//! nodes are synthesized from member paths, so archives without explicit
//! directory records still list correctly. Member data is streamed from the
//! container on demand; opening or stating a member reads nothing.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Take};
use std::path::Path;
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use flate2::CrcReader;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

use crate::adapter::recursive::FsFactory;
use crate::error::{Result, VfsError};
use crate::filesystem::cursor::{HandleReadAt, ReadAtCursor};
use crate::filesystem::dir::open_local;
use crate::filesystem::tree::{Node, Tree};
use crate::filesystem::{File, Filesystem, Metadata};
use crate::path;
use crate::synthetic::{SyntheticDirectory, SyntheticFileInfo};

/// Discriminator for zip containers
pub const ZIP_EXT: &str = ".zip";

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const LOCAL_HEADER_LEN: usize = 30;

type Source = Arc<HandleReadAt>;
type Archive = ZipArchive<ReadAtCursor<Source>>;
type RawData = Take<ReadAtCursor<Source>>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Codec {
    Stored,
    Deflated,
    /// Anything else is decoded by the archive reader itself
    Other,
}

/// Where a member's bytes live inside the container
#[derive(Clone, Copy, Debug)]
struct Location {
    index: usize,
    header_start: u64,
    compressed_size: u64,
    crc32: u32,
    codec: Codec,
}

struct Shared {
    name: String,
    len: u64,
    source: Source,
    archive: Mutex<Archive>,
}

/// Filesystem over the members of a zip archive
pub struct ZipFs {
    shared: Arc<Shared>,
    tree: Tree<Location>,
}

fn map_zip(name: &str, err: ZipError) -> VfsError {
    match err {
        ZipError::Io(e) => VfsError::io("zip", name, e),
        ZipError::FileNotFound => VfsError::not_found("open", name),
        other => VfsError::Archive(format!("{}: {}", name, other)),
    }
}

fn close_quietly(file: Box<dyn File>, name: &str) {
    if let Err(e) = file.close() {
        warn!("Failed to close {} after archive error: {}", name, e);
    }
}

impl ZipFs {
    /// Index an archive read through a handle that supports positional reads.
    ///
    /// The handle is closed when indexing fails.
    pub fn new(file: Box<dyn File>) -> Result<Self> {
        let info = match file.stat() {
            Ok(info) => info,
            Err(e) => {
                close_quietly(file, "zip container");
                return Err(e);
            }
        };
        let name = info.name.clone();
        let source: Source = match HandleReadAt::new(file) {
            Ok(reader) => Arc::new(reader),
            Err(file) => {
                close_quietly(file, &name);
                return Err(VfsError::Archive("random access is needed".to_string()));
            }
        };

        let indexed = Self::index(&source, &info);
        let (archive, tree) = match indexed {
            Ok(parts) => parts,
            Err(e) => {
                if let Ok(reader) = Arc::try_unwrap(source) {
                    close_quietly(reader.into_inner(), &name);
                }
                return Err(e);
            }
        };

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                len: info.size,
                source,
                archive: Mutex::new(archive),
            }),
            tree,
        })
    }

    fn index(source: &Source, info: &Metadata) -> Result<(Archive, Tree<Location>)> {
        let name = info.name.as_str();
        let mut archive = ZipArchive::new(ReadAtCursor::new(Arc::clone(source), info.size))
            .map_err(|e| map_zip(name, e))?;

        let mut tree = Tree::new(info.mtime);
        for index in 0..archive.len() {
            let member = archive
                .by_index_raw(index)
                .map_err(|e| map_zip(name, e))?;
            let member_path = member.name().trim_end_matches('/').to_string();
            if !path::valid_path(&member_path) {
                warn!("Skipping zip member with unusable path {:?} in {}", member.name(), name);
                continue;
            }

            if member.is_dir() {
                tree.insert_dir(&member_path, info.mtime)?;
                continue;
            }

            let mut md = Metadata::file(path::base(&member_path), member.size(), info.mtime);
            if let Some(mode) = member.unix_mode() {
                md = md.with_mode(mode & 0o7777);
            }
            let codec = match member.compression() {
                _ if member.encrypted() => Codec::Other,
                CompressionMethod::Stored => Codec::Stored,
                CompressionMethod::Deflated => Codec::Deflated,
                _ => Codec::Other,
            };
            let location = Location {
                index,
                header_start: member.header_start(),
                compressed_size: member.compressed_size(),
                crc32: member.crc32(),
                codec,
            };
            tree.insert_file(&member_path, md, location)?;
        }
        debug!("Indexed {} zip members from {}", archive.len(), name);
        Ok((archive, tree))
    }

    /// Open an archive from the local filesystem
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(open_local(path)?)
    }

    /// Name of the container this filesystem was built from
    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl Shared {
    /// Offset of the member data, found past its local header
    fn data_start(&self, location: &Location) -> io::Result<u64> {
        let mut header = [0u8; LOCAL_HEADER_LEN];
        let mut cursor = ReadAtCursor::new(Arc::clone(&self.source), self.len);
        cursor.seek(SeekFrom::Start(location.header_start))?;
        cursor.read_exact(&mut header)?;
        let signature = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if signature != LOCAL_HEADER_SIGNATURE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad local header at offset {}", location.header_start),
            ));
        }
        let name_len = u16::from_le_bytes([header[26], header[27]]) as u64;
        let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;
        Ok(location.header_start + LOCAL_HEADER_LEN as u64 + name_len + extra_len)
    }

    /// Compressed bytes of a member, read straight from the container
    fn raw_data(&self, location: &Location) -> io::Result<RawData> {
        let start = self.data_start(location)?;
        let end = start.saturating_add(location.compressed_size);
        if end > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("member data ends past the archive ({} > {})", end, self.len),
            ));
        }
        let mut cursor = ReadAtCursor::new(Arc::clone(&self.source), end);
        cursor.seek(SeekFrom::Start(start))?;
        Ok(cursor.take(location.compressed_size))
    }

    /// Decode a member the codec crate's way, holding it in memory
    fn inflate(&self, member_path: &str, index: usize) -> io::Result<Vec<u8>> {
        let mut archive = self.archive.lock();
        let mut member = archive
            .by_index(index)
            .map_err(|e| io::Error::from(map_zip(member_path, e)))?;
        let mut data = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut data)?;
        Ok(data)
    }

    fn body(&self, member_path: &str, location: &Location) -> io::Result<Body> {
        trace!("Streaming {} ({:?}) from {}", member_path, location.codec, self.name);
        Ok(match location.codec {
            Codec::Stored => Body::Stored(CrcReader::new(self.raw_data(location)?)),
            Codec::Deflated => Body::Deflated(CrcReader::new(DeflateDecoder::new(
                self.raw_data(location)?,
            ))),
            Codec::Other => Body::Decoded(Cursor::new(self.inflate(member_path, location.index)?)),
        })
    }
}

impl Filesystem for ZipFs {
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
            Some(Node::File { info, payload }) => Ok(Box::new(ZipMember {
                path: name.to_string(),
                info: info.clone(),
                location: *payload,
                shared: Arc::clone(&self.shared),
                body: Mutex::new(Body::Pending),
            })),
        }
    }
}

enum Body {
    Pending,
    Stored(CrcReader<RawData>),
    Deflated(CrcReader<DeflateDecoder<RawData>>),
    Decoded(Cursor<Vec<u8>>),
}

/// Archive member; forward-only like the codec's own readers.
///
/// Nothing is read from the container until the first `read`.
struct ZipMember {
    path: String,
    info: Metadata,
    location: Location,
    shared: Arc<Shared>,
    body: Mutex<Body>,
}

impl ZipMember {
    fn checked(&self, n: usize, want: usize, crc: u32) -> io::Result<usize> {
        if n == 0 && want > 0 && crc != self.location.crc32 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checksum mismatch for {} in {}", self.path, self.shared.name),
            ));
        }
        Ok(n)
    }
}

impl Read for ZipMember {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if matches!(self.body.get_mut(), Body::Pending) {
            let body = self.shared.body(&self.path, &self.location)?;
            *self.body.get_mut() = body;
        }

        let (n, crc) = match self.body.get_mut() {
            Body::Pending => return Ok(0),
            Body::Decoded(data) => return data.read(buf),
            Body::Stored(reader) => (reader.read(buf)?, reader.crc().sum()),
            Body::Deflated(reader) => (reader.read(buf)?, reader.crc().sum()),
        };
        self.checked(n, buf.len(), crc)
    }
}

impl File for ZipMember {
    fn stat(&self) -> Result<Metadata> {
        Ok(self.info.clone())
    }
}

/// Factory turning an opened `.zip` container into a [`ZipFs`]
pub fn zip_factory() -> FsFactory {
    Arc::new(|file: Box<dyn File>| -> Result<Arc<dyn Filesystem>> {
        Ok(Arc::new(ZipFs::new(file)?))
    })
}
