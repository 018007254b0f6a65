//! vfs-compose: composable read-only virtual filesystems
//!
//! Independent sources are stitched into one namespace and containers such
//! as zip archives are browsed as if they were directories.
//!
//! # Architecture
//!
//! - **Filesystems**: anything implementing [`filesystem::Filesystem`], a
//!   single `open(path)` returning a [`filesystem::File`] handle with optional
//!   positional-read and directory-listing capabilities.
//! - **Sources**: a local directory, an in-memory tree, and zip archives.
//! - **Adapters**: [`adapter::MergeFilesystem`] unions keyed filesystems,
//!   [`adapter::RecursiveMountFilesystem`] descends into container files and
//!   [`adapter::RandomAccessFilesystem`] spools sequential handles to disk so
//!   they can be read at arbitrary offsets.
//! - **Configuration**: a YAML composition file builds the whole stack.
//!
//! # Example
//!
//! ```no_run
//! use vfs_compose::config::Config;
//! use vfs_compose::filesystem::read_to_vec;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("compose.yaml".as_ref())?;
//! vfs_compose::logging::init(&config.logging);
//!
//! let merged = config.build()?;
//! let bytes = read_to_vec(&merged, "bundle/sample.zip/testdata/quote1.txt")?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod env;
pub mod error;
pub mod filesystem;
pub mod logging;
pub mod path;
pub mod synthetic;

pub use error::{Result, VfsError};
