//! Concurrent access to composed filesystems
//!
//! Adapters are shared across threads; handles that read at offsets are
//! shared too.

mod common;

use anyhow::Result;
use common::*;
use std::sync::Arc;
use std::thread;
use vfs_compose::adapter::MergeFilesystem;
use vfs_compose::filesystem::Filesystem;

#[test]
fn test_parallel_first_open_of_archive() -> Result<()> {
    let tree = standard_tree()?;
    let fs = tree.recursive();

    thread::scope(|scope| {
        for i in 0..16 {
            let fs = Arc::clone(&fs);
            scope.spawn(move || {
                let path = if i % 2 == 0 {
                    "bundles/sample.zip/testdata/quote1.txt"
                } else {
                    "bundles/nested.zip/inner/sample.zip/testdata/quote1.txt"
                };
                assert_file_content_str(&*fs, path, SAMPLE_QUOTE);
            });
        }
    });

    // racing first opens may each build an instance, but only one is kept per path
    assert_eq!(fs.cached_instances(), 3);
    Ok(())
}

#[test]
fn test_shared_handle_positional_reads() -> Result<()> {
    let tree = TestTree::new()?;
    tree.sample_zip("sample.zip")?;
    let fs = tree.random_access();
    let expected = pattern_bytes(100_000);

    let file = fs.open("sample.zip/testdata/blob.bin")?;
    let ra = file.as_read_at().expect("spooled member reads at offsets");

    thread::scope(|scope| {
        for worker in 0..8usize {
            let expected = &expected;
            scope.spawn(move || {
                let chunk = 5_000;
                let mut buf = vec![0u8; chunk];
                for offset in (worker * chunk..expected.len()).step_by(8 * chunk) {
                    let n = ra.read_at(&mut buf, offset as u64).unwrap();
                    let want = &expected[offset..(offset + chunk).min(expected.len())];
                    assert_eq!(&buf[..n], want, "mismatch at {}", offset);
                }
            });
        }
    });

    file.close()?;
    Ok(())
}

#[test]
fn test_mount_changes_while_reading() -> Result<()> {
    let tree = standard_tree()?;
    let merge = Arc::new(MergeFilesystem::new());
    merge.add("stable", tree.recursive());
    let churn = tree.dir_fs();

    thread::scope(|scope| {
        let readers = Arc::clone(&merge);
        scope.spawn(move || {
            for _ in 0..200 {
                assert_file_content_str(&*readers, "stable/docs/notes.txt", "plain notes");
            }
        });

        let writers = Arc::clone(&merge);
        let churn = Arc::clone(&churn);
        scope.spawn(move || {
            for i in 0..200 {
                let key = format!("churn{}", i % 4);
                writers.add(key.clone(), Arc::clone(&churn));
                assert!(writers.remove(&key));
            }
        });
    });

    assert_eq!(merge.mounts(), vec!["stable"]);
    Ok(())
}

#[cfg(feature = "stress")]
#[test]
fn test_stress_many_readers() -> Result<()> {
    let tree = standard_tree()?;
    let fs: Arc<dyn Filesystem> = tree.random_access();

    thread::scope(|scope| {
        for _ in 0..64 {
            let fs = Arc::clone(&fs);
            scope.spawn(move || {
                for _ in 0..50 {
                    assert_file_content(
                        &*fs,
                        "bundles/nested.zip/inner/sample.zip/testdata/blob.bin",
                        &pattern_bytes(100_000),
                    );
                }
            });
        }
    });
    Ok(())
}
