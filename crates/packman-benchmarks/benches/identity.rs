//! Package identity resolution benchmarks

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use packman_benchmarks::{criterion_config, package_archive};
use packman_core::types::PackId;

fn bench_identify_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("identify_archive");

    for entries in [1, 100, 1_000] {
        let archive = package_archive(entries);
        group.bench_with_input(BenchmarkId::new("entries", entries), &archive, |b, bytes| {
            b.iter(|| black_box(PackId::identify_reader(Cursor::new(bytes.as_slice()), Some("bench.zip")).unwrap()));
        });
    }

    group.finish();
}

fn bench_parse_pack_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_pack_id");

    group.bench_function("coordinates", |b| {
        b.iter(|| black_box("my_group:my-package:1.2.3-SNAPSHOT".parse::<PackId>().unwrap()));
    });

    let paths = [
        "/etc/packages/my_group/my-package-1.2.3.zip",
        "/etc/packages/my_group/my-package-1.2.3-SNAPSHOT.zip",
        "/etc/packages/day/cq540/product/cq-portlet-director-5.4.38.zip",
        "/etc/packages/adobe/aem6/sample-content-2.0.1-hotfix-1234.zip",
    ];
    group.bench_function("installation_path", |b| {
        let mut index = 0;
        b.iter(|| {
            let path = paths[index % paths.len()];
            index += 1;
            black_box(PackId::from_installation_path(path))
        });
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_identify_archive, bench_parse_pack_id
}
criterion_main!(benches);
