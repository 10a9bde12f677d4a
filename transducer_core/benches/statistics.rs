use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use transducer_core::MovingAverage;
use transducer_core::analyze_samples;

// Noisy burst around `center`, xorshift so runs are reproducible
fn synth_burst(n: usize, center: i32, noise: i32, seed: u32) -> Vec<i32> {
    let mut state = seed.max(1);
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let span = (2 * noise + 1) as u32;
            center + (state % span) as i32 - noise
        })
        .collect()
}

pub fn bench_analyze(c: &mut Criterion) {
    let quiet = synth_burst(100, 512, 2, 7);
    let noisy = synth_burst(100, 512, 60, 11);

    c.bench_function("analyze_samples_quiet_100", |b| {
        b.iter(|| analyze_samples(black_box(&quiet), 10))
    });
    c.bench_function("analyze_samples_noisy_100", |b| {
        b.iter(|| analyze_samples(black_box(&noisy), 10))
    });
}

pub fn bench_filter(c: &mut Criterion) {
    let trace = synth_burst(1000, 600, 20, 3);
    c.bench_function("moving_average_1000", |b| {
        b.iter_batched(
            || MovingAverage::new(10),
            |mut f| {
                for &s in &trace {
                    black_box(f.update(s));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_analyze, bench_filter);
criterion_main!(benches);
