//! Performance benchmarks for the rating engine

use arena_ladder::rating::{rate, RatingConfig};
use arena_ladder::types::Outcome;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_single_update(c: &mut Criterion) {
    let config = RatingConfig::default();

    c.bench_function("rate_single_update", |b| {
        b.iter(|| {
            rate(
                black_box(&config),
                black_box(1000),
                black_box(1200),
                black_box(Outcome::WinA),
            )
        })
    });
}

fn bench_rating_spread(c: &mut Criterion) {
    let config = RatingConfig::default();
    let pairs: Vec<(i64, i64)> = (0..100)
        .map(|i| (800 + i * 13, 3900 - i * 17))
        .collect();

    c.bench_function("rate_hundred_pairs", |b| {
        b.iter(|| {
            for (ra, rb) in &pairs {
                black_box(rate(&config, *ra, *rb, Outcome::Draw));
            }
        })
    });
}

criterion_group!(benches, bench_single_update, bench_rating_spread);
criterion_main!(benches);
