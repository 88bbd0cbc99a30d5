use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rc_reflist::{Accumulator, Buffer};
use std::time::Duration;

#[derive(Default, Clone)]
struct SumBuf {
    total: u64,
}

impl Buffer for SumBuf {
    type Value = u64;

    fn assign(&mut self, other: &Self) {
        self.total = other.total;
    }

    fn accum(&mut self, value: &u64) {
        self.total = self.total.wrapping_add(*value);
    }

    fn report(&self) -> &u64 {
        &self.total
    }

    fn reset(&mut self) {
        self.total = 0;
    }
}

// Producer alone: every accum after the first runs the copy-and-swap
// regime, which is the steady state of an unreported accumulator.
fn bench_accum_steady_100k(c: &mut Criterion) {
    c.bench_function("accum::steady_100k", |b| {
        b.iter_batched(
            || Accumulator::<SumBuf>::new().split(),
            |(mut tx, rx)| {
                for i in 0..100_000u64 {
                    tx.accum(i);
                }
                black_box((tx, rx))
            },
            BatchSize::SmallInput,
        )
    });
}

// Interleaved report/retire cycles exercise the reporting regimes
// without thread noise.
fn bench_accum_with_reports(c: &mut Criterion) {
    c.bench_function("accum::accum_with_report_every_64", |b| {
        b.iter_batched(
            || Accumulator::<SumBuf>::new().split(),
            |(mut tx, mut rx)| {
                let mut seen = 0u64;
                for i in 0..100_000u64 {
                    tx.accum(i);
                    if i % 64 == 0 {
                        if let Some(snap) = rx.report() {
                            seen = seen.wrapping_add(*snap);
                        }
                    }
                }
                black_box((tx, rx, seen))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_report_cycle(c: &mut Criterion) {
    c.bench_function("accum::report_retire_cycle_10k", |b| {
        b.iter_batched(
            || Accumulator::<SumBuf>::new().split(),
            |(mut tx, mut rx)| {
                let mut seen = 0u64;
                for i in 0..10_000u64 {
                    tx.accum(i);
                    seen = seen.wrapping_add(*rx.report().unwrap());
                }
                black_box((tx, rx, seen))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_accum_steady_100k, bench_accum_with_reports, bench_report_cycle
}
criterion_main!(benches);
