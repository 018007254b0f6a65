//! Merged namespaces built by hand and from composition files

mod common;

use anyhow::Result;
use common::*;
use std::sync::Arc;
use vfs_compose::adapter::MergeFilesystem;
use vfs_compose::filesystem::dir::DirFs;
use vfs_compose::filesystem::Filesystem;

#[test]
fn test_routing_matches_direct_open() -> Result<()> {
    let tree = standard_tree()?;
    let docs: Arc<dyn Filesystem> = Arc::new(DirFs::new(tree.join("docs")));
    let merge = MergeFilesystem::new();
    merge.add("docs", Arc::clone(&docs));
    merge.add("everything", tree.recursive());

    assert_eq!(
        read_all(&merge, "docs/readme.md"),
        read_all(&*docs, "readme.md")
    );
    assert_eq!(
        read_all(&merge, "everything/bundles/sample.zip/testdata/quote1.txt"),
        SAMPLE_QUOTE.as_bytes()
    );
    Ok(())
}

#[test]
fn test_root_lists_mount_keys() -> Result<()> {
    let tree = standard_tree()?;
    let merge = MergeFilesystem::new();
    merge.add("id1", Arc::new(DirFs::new(tree.join("docs"))));
    merge.add("id2", tree.recursive());

    assert_dir_lists(&merge, ".", &["id1", "id2"]);
    assert_dir_exists(&merge, "id2");
    assert_eq!(stat(&merge, "id2").name, "id2");
    assert_dir_lists(&merge, "id1", &["notes.txt", "readme.md"]);
    Ok(())
}

#[test]
fn test_remove_unmounts() -> Result<()> {
    let tree = standard_tree()?;
    let merge = MergeFilesystem::new();
    merge.add("docs", Arc::new(DirFs::new(tree.join("docs"))));
    merge.add("bundles", tree.recursive());

    assert!(!merge.remove("absent"));
    assert_eq!(merge.len(), 2);

    assert!(merge.remove("docs"));
    assert_not_exists(&merge, "docs/readme.md");
    assert_dir_lists(&merge, ".", &["bundles"]);
    Ok(())
}

#[test]
fn test_compose_from_config() -> Result<()> {
    let tree = standard_tree()?;
    let config = TestConfig::builder()
        .scratch_dir(tree.scratch())
        .add_directory("docs", &tree.join("docs"))
        .add_directory("bundles", &tree.join("bundles"))
        .build();
    let merge = compose(&config)?;

    assert_eq!(merge.mounts(), vec!["docs", "bundles"]);
    assert_file_content_str(&*merge, "docs/notes.txt", "plain notes");
    assert_file_content_str(&*merge, "bundles/sample.zip/testdata/quote1.txt", SAMPLE_QUOTE);
    assert_file_content_str(
        &*merge,
        "bundles/nested.zip/inner/sample.zip/testdata/proverbs/clear.txt",
        "Clear is better than clever.",
    );

    let file = merge.open("bundles/sample.zip/testdata/quote1.txt")?;
    let mut buf = [0u8; 7];
    let n = file
        .as_read_at()
        .expect("composed handles read at offsets")
        .read_at(&mut buf, 8)?;
    assert_eq!(&buf[..n], b"generic");
    file.close()?;
    Ok(())
}

#[test]
fn test_compose_zip_source() -> Result<()> {
    let tree = standard_tree()?;
    let config = TestConfig::builder()
        .scratch_dir(tree.scratch())
        .add_zip("sample", &tree.join("bundles/sample.zip"))
        .build();
    let merge = compose(&config)?;

    assert_dir_lists(&*merge, "sample", &["testdata"]);
    assert_file_content(&*merge, "sample/testdata/blob.bin", &pattern_bytes(100_000));
    Ok(())
}

#[test]
fn test_compose_without_recursion() -> Result<()> {
    let tree = standard_tree()?;
    let config = TestConfig::builder()
        .scratch_dir(tree.scratch())
        .recursive(false)
        .add_directory("bundles", &tree.join("bundles"))
        .build();
    let merge = compose(&config)?;

    assert_not_exists(&*merge, "bundles/sample.zip/testdata/quote1.txt");
    let md = stat(&*merge, "bundles/sample.zip");
    assert!(md.is_file());
    Ok(())
}

#[test]
fn test_compose_rejects_duplicate_keys() -> Result<()> {
    let tree = standard_tree()?;
    let config = TestConfig::builder()
        .add_directory("docs", &tree.join("docs"))
        .add_directory("docs", &tree.join("bundles"))
        .build();

    let err = compose(&config).err().expect("duplicate keys must fail");
    assert!(err.to_string().contains("Duplicate mount key"), "{}", err);
    Ok(())
}
