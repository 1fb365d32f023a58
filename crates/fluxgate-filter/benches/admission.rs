//! Benchmarks for the similarity admission filter
//!
//! Measures the per-frame cost of `admit` at typical latent and
//! pixel-space representation sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fluxgate_filter::{FilterConfig, SimilarityFilter};

/// Synthetic representation with a small per-frame drift
fn create_frame(len: usize, phase: f32) -> Vec<f32> {
    (0..len)
        .map(|i| ((i as f32) * 0.013 + phase).sin())
        .collect()
}

fn bench_admit(c: &mut Criterion) {
    let mut group = c.benchmark_group("admit");

    // 4x64x64 latent, 4x96x64 latent, 3x512x512 pixels
    for len in [16_384usize, 24_576, 786_432] {
        let frames = [create_frame(len, 0.0), create_frame(len, 0.001)];
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("elements", len), &frames, |b, frames| {
            let mut filter =
                SimilarityFilter::new(FilterConfig::default().with_seed(42)).unwrap();
            let mut i = 0usize;
            b.iter(|| {
                i += 1;
                filter.admit(black_box(&frames[i % 2]))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_admit);
criterion_main!(benches);
