use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use cordyceps_avl::AvlSet;

/// Builds the two halves of `0..2n+1` around the middle key.
fn halves(n: u32) -> (AvlSet<u32>, u32, AvlSet<u32>) {
    ((0..n).collect(), n, (n + 1..2 * n + 1).collect())
}

/// Compares joining two sets around a pivot with inserting every key of the right set into the
/// left one.
fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");

    for num_levels in [7, 11, 15] {
        let n = 2u32.pow(num_levels) / 2;

        group.bench_function(BenchmarkId::new("join", n), |b| {
            b.iter_batched(
                || halves(n),
                |(left, pivot, right)| black_box(AvlSet::join(left, pivot, right)),
                BatchSize::LargeInput,
            )
        });

        group.bench_function(BenchmarkId::new("reinsert", n), |b| {
            b.iter_batched(
                || halves(n),
                |(mut left, pivot, right)| {
                    let _ = left.insert(pivot);
                    left.extend(right.iter().copied());
                    black_box(left)
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    for num_levels in [7, 11, 15] {
        let n = 2u32.pow(num_levels) - 1;

        group.bench_function(BenchmarkId::new("split", n), |b| {
            b.iter_batched(
                || (0..n).collect::<AvlSet<u32>>(),
                |set| black_box(set.split(&(n / 3))),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_join, bench_split);
criterion_main!(benches);
