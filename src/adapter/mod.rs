//! Composing adapters
//!
//! Each adapter is itself a [`Filesystem`](crate::filesystem::Filesystem)
//! wrapping one or more others, so they stack freely.

pub mod merge;
pub mod random_access;
pub mod recursive;

pub use merge::{MergeFilesystem, Mount};
pub use random_access::{spooling_factory, RandomAccessFile, RandomAccessFilesystem};
pub use recursive::{FactoryRegistry, FsFactory, RecursiveMountFilesystem};
