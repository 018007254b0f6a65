//! `Read + Seek` over positional reads
//!
//! Codec crates want a seekable reader; composed handles offer `ReadAt`.
//! The cursor bridges the two without sharing a position with anyone else.

use std::io::{self, Read, Seek, SeekFrom};

use crate::filesystem::{File, ReadAt};

/// Seekable reader over a [`ReadAt`] source of known length
pub struct ReadAtCursor<R> {
    inner: R,
    len: u64,
    pos: u64,
}

impl<R: ReadAt> ReadAtCursor<R> {
    pub fn new(inner: R, len: u64) -> Self {
        Self { inner, len, pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ReadAt> Read for ReadAtCursor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min((self.len - self.pos) as usize);
        let n = self.inner.read_at(&mut buf[..want], self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: ReadAt> Seek for ReadAtCursor<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(offset) => {
                self.pos = offset;
                Ok(offset)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

/// Owns an open handle and forwards its random-access capability
pub struct HandleReadAt {
    file: Box<dyn File>,
}

impl HandleReadAt {
    /// Returns the handle back when it cannot read at arbitrary offsets
    pub fn new(file: Box<dyn File>) -> std::result::Result<Self, Box<dyn File>> {
        if file.as_read_at().is_some() {
            Ok(Self { file })
        } else {
            Err(file)
        }
    }

    pub fn into_inner(self) -> Box<dyn File> {
        self.file
    }
}

impl ReadAt for HandleReadAt {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        match self.file.as_read_at() {
            Some(ra) => ra.read_at(buf, offset),
            None => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "handle lost random access",
            )),
        }
    }
}
