//! Benchmarks for reshape-index using criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reshape_core::ItemIndex;
use reshape_index::{HashIndex, Index};

fn hash_insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_insert");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut index: HashIndex<String> = HashIndex::new(false);
                for i in 0..size {
                    index
                        .add(format!("group-{}", i % 64), ItemIndex::from(i))
                        .unwrap();
                }
                black_box(index)
            });
        });
    }

    group.finish();
}

fn hash_get_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_get");

    for size in [100, 1000, 10000].iter() {
        let mut index: HashIndex<String> = HashIndex::new(true);
        for i in 0..*size {
            index.add(format!("key-{}", i), ItemIndex::from(i)).unwrap();
        }
        let probes: Vec<String> = (0..100).map(|x| format!("key-{}", x * size / 100)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                for key in &probes {
                    black_box(index.get_first(key));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, hash_insert_benchmark, hash_get_benchmark);
criterion_main!(benches);
