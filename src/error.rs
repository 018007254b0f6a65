use std::io;
use thiserror::Error;

/// Main error type for vfs-compose operations
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("{op} {path}: invalid path")]
    InvalidPath { op: &'static str, path: String },

    #[error("{op} {path}: file does not exist")]
    NotFound { op: &'static str, path: String },

    #[error("{op} {path}: not a directory")]
    NotADirectory { op: &'static str, path: String },

    #[error("{path}: FS not found for {discriminator:?}")]
    FactoryNotFound { path: String, discriminator: String },

    #[error("end of stream")]
    EndOfStream,

    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Bare(#[from] io::Error),

    #[error("close failed: {close}; scratch cleanup failed: {cleanup}")]
    Close {
        close: Box<VfsError>,
        cleanup: io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VfsError {
    pub fn invalid_path(op: &'static str, path: impl Into<String>) -> Self {
        VfsError::InvalidPath {
            op,
            path: path.into(),
        }
    }

    pub fn not_found(op: &'static str, path: impl Into<String>) -> Self {
        VfsError::NotFound {
            op,
            path: path.into(),
        }
    }

    pub fn not_a_directory(op: &'static str, path: impl Into<String>) -> Self {
        VfsError::NotADirectory {
            op,
            path: path.into(),
        }
    }

    /// Wrap an underlying I/O failure with the operation and path that caused it
    pub fn io(op: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        VfsError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True for every flavour of "this path does not exist".
    ///
    /// Invalid paths count as missing, the same way an invalid name can never
    /// be found in any backing source.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound { .. } | VfsError::InvalidPath { .. } => true,
            VfsError::Io { source, .. } | VfsError::Bare(source) => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// Convert error to a libc errno
    pub fn to_errno(&self) -> i32 {
        match self {
            VfsError::InvalidPath { .. } => libc::EINVAL,
            VfsError::NotFound { .. } => libc::ENOENT,
            VfsError::NotADirectory { .. } => libc::ENOTDIR,
            VfsError::FactoryNotFound { .. } => libc::ENOENT,
            VfsError::EndOfStream => libc::ENODATA,
            VfsError::Io { source, .. } | VfsError::Bare(source) => {
                source.raw_os_error().unwrap_or(libc::EIO)
            }
            VfsError::Close { close, .. } => close.to_errno(),
            VfsError::Archive(_) => libc::EIO,
            VfsError::Config(_) => libc::EINVAL,
        }
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        let kind = match &err {
            VfsError::InvalidPath { .. } => io::ErrorKind::InvalidInput,
            VfsError::NotFound { .. } | VfsError::FactoryNotFound { .. } => {
                io::ErrorKind::NotFound
            }
            VfsError::EndOfStream => io::ErrorKind::UnexpectedEof,
            VfsError::Io { source, .. } | VfsError::Bare(source) => source.kind(),
            VfsError::Archive(_) => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Result type alias for vfs-compose operations
pub type Result<T> = std::result::Result<T, VfsError>;
