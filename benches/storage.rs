// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for chunk reads, writes, and range scans.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tempfile::TempDir;
use voxdag::dag::VersionUuid;
use voxdag::datastore::{Datastore, DatastoreConfig};
use voxdag::datatype::DataConfig;
use voxdag::index::{ChunkPoint3d, Point3d, Subvolume};

const SIDE: i32 = 16;
const BLOCK_BYTES: usize = 16 * 16 * 16;

fn create_test_store() -> (Datastore, VersionUuid, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Datastore::open_with_config(&DatastoreConfig::rocksdb(dir.path())).unwrap();
    let (root, _) = store.new_dataset().unwrap();
    store
        .new_data(&root, "voxels", "gray", &DataConfig::parse(["BlockSize=16"]).unwrap())
        .unwrap();
    (store, root, dir)
}

fn populate(store: &Datastore, root: &VersionUuid) {
    let chunks = (0..SIDE * SIDE * SIDE).map(|i| {
        let p = ChunkPoint3d::new(i % SIDE, (i / SIDE) % SIDE, i / (SIDE * SIDE));
        (p, vec![(i % 251) as u8; BLOCK_BYTES])
    });
    store.bulk_load(root, "gray", 0, chunks).unwrap();
}

fn bench_point_read(c: &mut Criterion) {
    let (store, root, _dir) = create_test_store();
    populate(&store, &root);

    let mut group = c.benchmark_group("storage");
    group.throughput(Throughput::Bytes(BLOCK_BYTES as u64));

    group.bench_function("get_chunk", |b| {
        b.iter_batched(
            || {
                let i = rand::random::<u32>() as i32 & 0x0fff;
                ChunkPoint3d::new(i % SIDE, (i / SIDE) % SIDE, i / (SIDE * SIDE))
            },
            |p| store.get_chunk(&root, "gray", 0, p).unwrap(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_point_write(c: &mut Criterion) {
    let (store, root, _dir) = create_test_store();

    let mut group = c.benchmark_group("storage");
    group.throughput(Throughput::Bytes(BLOCK_BYTES as u64));

    let counter = std::sync::atomic::AtomicI32::new(0);
    let block = vec![7u8; BLOCK_BYTES];

    group.bench_function("put_chunk", |b| {
        b.iter(|| {
            let x = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            store
                .put_chunk(&root, "gray", 0, ChunkPoint3d::new(x, 0, 0), &block)
                .unwrap()
        })
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let (store, root, _dir) = create_test_store();
    populate(&store, &root);

    let mut group = c.benchmark_group("storage");

    // 4x4x4 chunks: 16 row scans of 4 chunks each.
    let sub = Subvolume::new(Point3d::new(64, 64, 64), Point3d::cube(64));
    group.throughput(Throughput::Elements(64));
    group.bench_function("scan_64_chunks", |b| {
        b.iter(|| {
            let chunks = store.scan_chunks(&root, "gray", 0, &sub).unwrap();
            assert_eq!(chunks.len(), 64);
        })
    });

    group.finish();
}

fn bench_merged_read(c: &mut Criterion) {
    let (store, root, _dir) = create_test_store();
    populate(&store, &root);

    // Ten locked generations on top of the data.
    let mut head = root;
    for _ in 0..10 {
        store.lock(&head).unwrap();
        head = store.new_version(&head).unwrap();
    }

    let mut group = c.benchmark_group("storage");
    group.throughput(Throughput::Elements(1));
    group.bench_function("get_chunk_merged_depth_10", |b| {
        b.iter(|| {
            store
                .get_chunk_merged(&head, "gray", 0, ChunkPoint3d::new(3, 3, 3))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_point_read,
    bench_point_write,
    bench_scan,
    bench_merged_read
);
criterion_main!(benches);
