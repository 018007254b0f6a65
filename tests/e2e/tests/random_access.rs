//! Positional reads over sequential sources
//!
//! Every access pattern must reproduce the source bytes exactly, whatever
//! order the chunks are requested in.

mod common;

use anyhow::Result;
use common::*;
use rand::Rng;
use std::io::Read;
use std::sync::Arc;
use test_case::test_case;
use vfs_compose::adapter::RandomAccessFilesystem;
use vfs_compose::filesystem::memory::MemoryFs;
use vfs_compose::filesystem::{File, Filesystem};

const BLOB_LEN: usize = 100_000;

fn spooled_blob(tree: &TestTree, data: &[u8]) -> Result<Box<dyn File>> {
    let source: Arc<dyn Filesystem> = Arc::new(
        MemoryFs::builder()
            .file("blob.bin", data.to_vec())
            .sequential()
            .build()?,
    );
    let fs = RandomAccessFilesystem::new(source, tree.scratch());
    Ok(fs.open("blob.bin")?)
}

#[test_case(17 ; "tiny chunks")]
#[test_case(4096 ; "page chunks")]
#[test_case(65536 ; "large chunks")]
#[test_case(BLOB_LEN ; "single chunk")]
fn test_shuffled_chunks_match_source(chunk: usize) -> Result<()> {
    let tree = TestTree::new()?;
    let data = random_bytes(BLOB_LEN);
    let file = spooled_blob(&tree, &data)?;
    let ra = file.as_read_at().expect("spooled handle reads at offsets");

    let mut rebuilt = vec![0u8; data.len()];
    for (offset, size) in shuffled_chunks(data.len(), chunk) {
        let n = ra.read_at(&mut rebuilt[offset..offset + size], offset as u64)?;
        assert_eq!(n, size, "short read at offset {}", offset);
    }
    assert_eq!(rebuilt, data);
    file.close()?;
    Ok(())
}

#[test]
fn test_overlapping_reads() -> Result<()> {
    let tree = TestTree::new()?;
    let data = random_bytes(BLOB_LEN);
    let file = spooled_blob(&tree, &data)?;
    let ra = file.as_read_at().expect("spooled handle reads at offsets");

    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let offset = rng.gen_range(0..data.len());
        let len = rng.gen_range(1..=8192);
        let mut buf = vec![0u8; len];
        let n = ra.read_at(&mut buf, offset as u64)?;
        let expected = &data[offset..(offset + len).min(data.len())];
        assert_eq!(n, expected.len());
        assert_eq!(&buf[..n], expected);
    }
    file.close()?;
    Ok(())
}

#[test]
fn test_reads_past_end_are_short() -> Result<()> {
    let tree = TestTree::new()?;
    let data = random_bytes(1000);
    let file = spooled_blob(&tree, &data)?;
    let ra = file.as_read_at().expect("spooled handle reads at offsets");

    let mut buf = [0u8; 64];
    assert_eq!(ra.read_at(&mut buf, 980)?, 20);
    assert_eq!(&buf[..20], &data[980..]);
    assert_eq!(ra.read_at(&mut buf, 1000)?, 0);
    assert_eq!(ra.read_at(&mut buf, 5000)?, 0);
    file.close()?;
    Ok(())
}

#[test]
fn test_sequential_read_after_positional() -> Result<()> {
    let tree = TestTree::new()?;
    let data = random_bytes(10_000);
    let mut file = spooled_blob(&tree, &data)?;

    let mut head = vec![0u8; 1000];
    file.read_exact(&mut head)?;
    assert_eq!(head, &data[..1000]);

    let mut tail = [0u8; 10];
    let n = file
        .as_read_at()
        .expect("spooled handle reads at offsets")
        .read_at(&mut tail, 9_990)?;
    assert_eq!(n, 10);
    assert_eq!(&tail, &data[9_990..]);

    // sequential reading resumes after the drained region
    let mut rest = Vec::new();
    file.read_to_end(&mut rest)?;
    assert!(rest.is_empty());

    // earlier ranges are still served from the spool
    let mut mid = [0u8; 100];
    let ra = file.as_read_at().unwrap();
    assert_eq!(ra.read_at(&mut mid, 4_000)?, 100);
    assert_eq!(&mid[..], &data[4_000..4_100]);
    file.close()?;
    Ok(())
}

#[test]
fn test_native_handles_pass_through() -> Result<()> {
    let tree = TestTree::new()?;
    tree.file("native.bin", pattern_bytes(4096))?;
    let fs = RandomAccessFilesystem::new(tree.dir_fs(), tree.scratch());

    let file = fs.open("native.bin")?;
    assert!(file.as_read_at().is_some());
    assert_eq!(tree.spool_files()?, 0);
    file.close()?;

    let mut dir = fs.open(".")?;
    assert!(dir.as_read_dir().is_some());
    assert_eq!(tree.spool_files()?, 0);
    Ok(())
}

#[test]
fn test_spool_released_on_drop() -> Result<()> {
    let tree = TestTree::new()?;
    let file = spooled_blob(&tree, &random_bytes(2048))?;
    assert_eq!(tree.spool_files()?, 1);
    drop(file);
    assert_eq!(tree.spool_files()?, 0);
    Ok(())
}
