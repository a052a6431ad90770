use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dirdiff_common::AppConfig;
use dirdiff_core::normalize::canonical_candidate;
use dirdiff_core::{ComparisonEngine, DirectoryTree, FileIndex, Snapshot, TreeBuilder};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// Nested directories of plain files plus a versioned library family per directory
fn create_test_tree(root: &Path, depth: usize, files_per_dir: usize) {
    if depth == 0 {
        return;
    }

    for i in 0..files_per_dir {
        fs::write(root.join(format!("file_{}.txt", i)), b"x").unwrap();
    }
    fs::write(root.join("libdemo.so"), b"").unwrap();
    fs::write(root.join("libdemo.so.1"), b"").unwrap();
    fs::write(root.join("libdemo.so.1.4.2"), b"").unwrap();

    if depth > 1 {
        for i in 0..3 {
            let dir_path = root.join(format!("subdir_{}", i));
            fs::create_dir(&dir_path).unwrap();
            create_test_tree(&dir_path, depth - 1, files_per_dir);
        }
    }
}

fn bench_normalize(c: &mut Criterion) {
    let names = [
        "libfoo.so.1.2.3",
        "libbar-2.so",
        "readme.txt",
        "libbaz.so.debug",
    ];

    c.bench_function("canonical_candidate_mixed_names", |b| {
        b.iter(|| {
            for name in &names {
                black_box(canonical_candidate(black_box(name)));
            }
        });
    });
}

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");

    for depth in [1usize, 2, 3].iter() {
        let temp = TempDir::new().unwrap();
        create_test_tree(temp.path(), *depth, 10);

        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| black_box(DirectoryTree::build(black_box(temp.path())).unwrap()));
        });
    }

    group.finish();
}

fn bench_tree_build_with_ignore(c: &mut Criterion) {
    c.bench_function("tree_build_with_custom_patterns", |b| {
        let temp = TempDir::new().unwrap();
        create_test_tree(temp.path(), 2, 10);

        let config = AppConfig {
            ignore_patterns: vec!["*.o".to_string(), "*.tmp".to_string(), "subdir_1/".to_string()],
            ..Default::default()
        };
        let builder = TreeBuilder::new(config).unwrap();

        b.iter(|| black_box(builder.build(black_box(temp.path())).unwrap()));
    });
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for depth in [1usize, 2, 3].iter() {
        let temp = TempDir::new().unwrap();
        create_test_tree(temp.path(), *depth, 10);
        let tree = DirectoryTree::build(temp.path()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| black_box(FileIndex::build(black_box(&tree))));
        });
    }

    group.finish();
}

fn bench_compare_snapshots(c: &mut Criterion) {
    let temp_root = TempDir::new().unwrap();
    let left = temp_root.path().join("left");
    let right = temp_root.path().join("right");
    fs::create_dir(&left).unwrap();
    fs::create_dir(&right).unwrap();
    create_test_tree(&left, 3, 8);
    create_test_tree(&right, 3, 10);

    let builder = TreeBuilder::default();
    let left_snapshot = Snapshot::scan(&builder, &left).unwrap();
    let right_snapshot = Snapshot::scan(&builder, &right).unwrap();
    let engine = ComparisonEngine::default();

    c.bench_function("compare_prebuilt_snapshots", |b| {
        b.iter(|| black_box(engine.compare_snapshots(&left_snapshot, &right_snapshot)));
    });
}

fn bench_full_scan_and_compare(c: &mut Criterion) {
    c.bench_function("full_workflow_scan_and_compare", |b| {
        let temp_root = TempDir::new().unwrap();
        let left = temp_root.path().join("left");
        let right = temp_root.path().join("right");
        fs::create_dir(&left).unwrap();
        fs::create_dir(&right).unwrap();

        create_test_tree(&left, 2, 5);
        create_test_tree(&right, 2, 7);

        let engine = ComparisonEngine::default();
        b.iter(|| black_box(engine.compare(black_box(&left), black_box(&right)).unwrap()));
    });
}

criterion_group!(normalize_benches, bench_normalize);

criterion_group!(
    scan_benches,
    bench_tree_build,
    bench_tree_build_with_ignore,
    bench_index_build
);

criterion_group!(
    comparison_benches,
    bench_compare_snapshots,
    bench_full_scan_and_compare
);

criterion_main!(normalize_benches, scan_benches, comparison_benches);
