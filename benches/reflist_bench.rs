use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand_core::{RngCore, SeedableRng};
use rand_pcg::Lcg128Xsl64 as Pcg;
use rc_reflist::{RefList, RefOwned, StrongRef};
use std::time::Duration;

type Item = RefOwned<u64>;

fn filled(n: usize, seed: u64) -> (RefList<Item>, Vec<StrongRef<Item>>) {
    let list = RefList::new();
    let mut rng = Pcg::seed_from_u64(seed);
    let refs: Vec<_> = (0..n).map(|_| RefOwned::new(rng.next_u64())).collect();
    for r in &refs {
        list.append(r.clone());
    }
    (list, refs)
}

fn bench_append_100k(c: &mut Criterion) {
    c.bench_function("reflist::append_100k", |b| {
        b.iter_batched(
            || {
                let mut rng = Pcg::seed_from_u64(1);
                (0..100_000)
                    .map(|_| RefOwned::new(rng.next_u64()))
                    .collect::<Vec<_>>()
            },
            |refs| {
                let list = RefList::new();
                for r in &refs {
                    list.append(r.clone());
                }
                black_box((list, refs))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_prepend_append_mix(c: &mut Criterion) {
    c.bench_function("reflist::prepend_append_mix_100k", |b| {
        b.iter_batched(
            || {
                let mut rng = Pcg::seed_from_u64(2);
                (0..100_000)
                    .map(|_| RefOwned::new(rng.next_u64()))
                    .collect::<Vec<_>>()
            },
            |refs| {
                let list = RefList::new();
                for (i, r) in refs.iter().enumerate() {
                    if i % 2 == 0 {
                        list.append(r.clone());
                    } else {
                        list.prepend(r.clone());
                    }
                }
                black_box((list, refs))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iterate_100k(c: &mut Criterion) {
    let (list, _held) = filled(100_000, 3);
    c.bench_function("reflist::iterate_100k", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for r in list.iter() {
                acc = acc.wrapping_add(*r.as_ref().unwrap().get());
            }
            black_box(acc)
        })
    });
}

fn bench_remove_10k_and_compact(c: &mut Criterion) {
    c.bench_function("reflist::remove_10k_of_100k_then_compact", |b| {
        b.iter_batched(
            || {
                let (list, refs) = filled(100_000, 5);
                // Precompute 10k distinct victims.
                let n = refs.len();
                let mut sel = std::collections::HashSet::with_capacity(10_000);
                let mut rng = Pcg::seed_from_u64(0x9e37_79b9_7f4a_7c15);
                while sel.len() < 10_000 {
                    sel.insert((rng.next_u64() as usize) % n);
                }
                let victims: Vec<usize> = sel.into_iter().collect();
                (list, refs, victims)
            },
            |(list, refs, victims)| {
                for &k in &victims {
                    list.remove(refs[k].as_ref().unwrap());
                }
                black_box((list, refs))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_cursor_walk_with_removal(c: &mut Criterion) {
    c.bench_function("reflist::cursor_remove_every_other_of_10k", |b| {
        b.iter_batched(
            || filled(10_000, 7),
            |(list, refs)| {
                let mut keep = true;
                let mut cur = list.cursor();
                while !cur.is_done() {
                    if !keep {
                        let _ = cur.remove();
                    }
                    keep = !keep;
                    cur.advance();
                }
                drop(cur);
                black_box((list, refs))
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
    name = benches_build;
    config = bench_config();
    targets = bench_append_100k, bench_prepend_append_mix
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_iterate_100k,
              bench_remove_10k_and_compact,
              bench_cursor_walk_with_removal
}
criterion_main!(benches_build, benches_ops);
