//! Read throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use vfs_compose::adapter::RandomAccessFilesystem;
use vfs_compose::filesystem::memory::MemoryFs;
use vfs_compose::filesystem::Filesystem;
use vfs_compose_e2e::{pattern_bytes, TestTree, ZipFixture};

const SIZES: [(&str, usize); 3] = [
    ("64KB", 64 * 1024),
    ("1MB", 1024 * 1024),
    ("10MB", 10 * 1024 * 1024),
];

fn bench_archive_member_read(c: &mut Criterion) {
    let tree = TestTree::new().expect("fixture tree");
    let mut group = c.benchmark_group("archive_member_read");
    group.measurement_time(Duration::from_secs(10));

    let mut archive = ZipFixture::new();
    for (name, size) in SIZES {
        archive = archive
            .file(&format!("blob_{}.bin", name), pattern_bytes(size))
            .expect("add member");
    }
    tree.file("bench.zip", archive.finish().expect("finish archive"))
        .expect("write archive");
    let fs = tree.recursive();

    for (name, size) in SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        let path = format!("bench.zip/blob_{}.bin", name);

        group.bench_with_input(BenchmarkId::new("full_read", name), &path, |b, path| {
            b.iter(|| {
                let mut file = fs.open(path).unwrap();
                let mut data = Vec::with_capacity(size);
                file.read_to_end(&mut data).unwrap();
                file.close().unwrap();
                black_box(data.len());
            });
        });
    }

    group.finish();
}

fn bench_spooled_random_read(c: &mut Criterion) {
    let tree = TestTree::new().expect("fixture tree");
    let mut group = c.benchmark_group("spooled_random_read");

    for (name, size) in SIZES {
        let source: Arc<dyn Filesystem> = Arc::new(
            MemoryFs::builder()
                .file("blob.bin", pattern_bytes(size))
                .sequential()
                .build()
                .unwrap(),
        );
        let fs = RandomAccessFilesystem::new(source, tree.scratch());
        group.throughput(Throughput::Bytes(size as u64));

        // reverse 4KB chunks force a full drain on the first read
        group.bench_with_input(BenchmarkId::new("reverse_4k", name), &size, |b, &size| {
            b.iter(|| {
                let file = fs.open("blob.bin").unwrap();
                let ra = file.as_read_at().unwrap();
                let mut buf = [0u8; 4096];
                let mut offset = size;
                while offset > 0 {
                    offset = offset.saturating_sub(buf.len());
                    black_box(ra.read_at(&mut buf, offset as u64).unwrap());
                }
                file.close().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_archive_member_read, bench_spooled_random_read);
criterion_main!(benches);
