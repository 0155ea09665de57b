use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use imrank::descriptor::{ColorHistogram, DescriptorVector};
use imrank::ranker::{Candidate, rank};
use imrank::weights::{Mode, Scorer, Weights};
use rand::prelude::*;

fn random_vec(rng: &mut impl Rng, len: usize, scale: f64) -> Vec<f64> {
    (0..len).map(|_| rng.random::<f64>() * scale).collect()
}

fn random_descriptors(rng: &mut impl Rng) -> DescriptorVector {
    DescriptorVector {
        color_histogram: Some(ColorHistogram {
            blue: random_vec(rng, 256, 1.),
            green: random_vec(rng, 256, 1.),
            red: random_vec(rng, 256, 1.),
            ..Default::default()
        }),
        dominant_colors: Some((0..5).map(|_| random_vec(rng, 3, 255.)).collect()),
        texture_descriptors: Some(random_vec(rng, 2048, 1.)),
        hu_moments: Some(random_vec(rng, 7, 1.)),
        ..Default::default()
    }
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("Rank");
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let mut rng = rand::rng();
    let query = random_descriptors(&mut rng);
    let weights = Weights::default();

    for n in [1000, 10000] {
        let candidates: Vec<_> = (0..n)
            .map(|id| Candidate { id, descriptors: random_descriptors(&mut rng) })
            .collect();
        group.throughput(Throughput::Elements(n as u64));

        for mode in [Mode::Bulk, Mode::Full] {
            let scorer = Scorer::new(weights, mode, &query);
            group.bench_with_input(BenchmarkId::new(mode.as_str(), n), &candidates, |b, candidates| {
                b.to_async(&rt).iter(|| async {
                    rank(&scorer, candidates.as_slice(), None, black_box(10)).await.unwrap()
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
