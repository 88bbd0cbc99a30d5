#[cfg(target_os = "linux")]
mod bench {
    use iai::black_box;
    use rc_reflist::{RefList, RefOwned, StrongRef};

    type Item = RefOwned<u64>;

    fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
        std::iter::from_fn(move || {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            Some(s)
        })
    }

    fn filled(n: usize, seed: u64) -> (RefList<Item>, Vec<StrongRef<Item>>) {
        let list = RefList::new();
        let refs: Vec<_> = lcg(seed).take(n).map(RefOwned::new).collect();
        for r in &refs {
            list.append(r.clone());
        }
        (list, refs)
    }

    // Append 10k shared handles.
    pub fn reflist_append_10k() {
        let (list, refs) = filled(10_000, 1);
        black_box((list.len(), refs.len()));
    }

    // Full forward walk over 10k elements.
    pub fn reflist_iterate_10k() {
        let (list, _refs) = filled(10_000, 7);
        let mut acc = 0u64;
        for r in list.iter() {
            acc = acc.wrapping_add(*r.as_ref().unwrap().get());
        }
        black_box(acc);
    }

    // Remove every other element under a cursor, then let the cursor's
    // drop trigger compaction.
    pub fn reflist_remove_half_10k() {
        let (list, _refs) = filled(10_000, 11);
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
        black_box(list.len());
    }

    // Clone and drop a handle repeatedly.
    pub fn strong_ref_clone_drop() {
        let r = RefOwned::new(1u64);
        for _ in 0..10_000 {
            let x = r.clone();
            black_box(&x);
            drop(x);
        }
    }
}

#[cfg(target_os = "linux")]
iai::main!(
    bench::reflist_append_10k,
    bench::reflist_iterate_10k,
    bench::reflist_remove_half_10k,
    bench::strong_ref_clone_drop
);

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("Skipping: iai benches require Linux/valgrind.");
}
