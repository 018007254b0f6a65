//! Common test utilities and fixtures

#![allow(dead_code)]

pub use vfs_compose_e2e::*;

use anyhow::Result;
use std::sync::Arc;
use vfs_compose::adapter::MergeFilesystem;
use vfs_compose::config::Config;

/// Tree with a plain directory, the sample archive, and an archive that
/// carries another archive inside it
pub fn standard_tree() -> Result<TestTree> {
    let tree = TestTree::new()?;
    tree.file("docs/readme.md", "# fixtures")?;
    tree.file("docs/notes.txt", "plain notes")?;
    tree.sample_zip("bundles/sample.zip")?;

    let nested = ZipFixture::new()
        .file("outer.txt", "outer member")?
        .file("inner/sample.zip", sample_zip_bytes()?)?
        .finish()?;
    tree.file("bundles/nested.zip", nested)?;
    Ok(tree)
}

/// Write `config` to disk, load it back and build the merge
pub fn compose(config: &TestConfig) -> Result<Arc<MergeFilesystem>> {
    let file = tempfile::NamedTempFile::new()?;
    config.write_to_file(file.path())?;
    let loaded = Config::from_file(file.path())?;
    Ok(Arc::new(loaded.build()?))
}
