use rc_reflist::{Accumulator, Buffer};
use std::cell::Cell;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct SumBuf {
    total: i64,
}

impl Buffer for SumBuf {
    type Value = i64;

    fn assign(&mut self, other: &Self) {
        self.total = other.total;
    }

    fn accum(&mut self, value: &i64) {
        self.total += *value;
    }

    fn report(&self) -> &i64 {
        &self.total
    }

    fn reset(&mut self) {
        self.total = 0;
    }
}

#[test]
fn sequential_sum_cycle() {
    let (mut tx, mut rx) = Accumulator::<SumBuf>::new().split();

    tx.accum(1);
    tx.accum(2);
    tx.accum(3);
    assert_eq!(*rx.report().expect("accumulation available"), 6);

    tx.accum(4);
    assert_eq!(*rx.report().expect("accumulation available"), 4);
    assert!(rx.report().is_none());
}

/// String-concatenation buffer that slows itself down and checks, via
/// its own flags, that the protocol never lets an accumulation overlap
/// itself or a held snapshot.
#[derive(Default)]
struct StrBuf {
    data: String,
    accumulating: Cell<bool>,
    reporting: Cell<bool>,
}

impl Buffer for StrBuf {
    type Value = String;

    fn assign(&mut self, other: &Self) {
        assert!(!self.accumulating.get());
        assert!(!other.accumulating.get());
        assert!(!self.reporting.get());
        self.data = other.data.clone();
    }

    fn accum(&mut self, value: &String) {
        assert!(!self.accumulating.get());
        assert!(!self.reporting.get());
        self.accumulating.set(true);
        self.data.push_str(value);
        thread::sleep(Duration::from_millis(2));
        self.accumulating.set(false);
    }

    fn report(&self) -> &String {
        assert!(!self.accumulating.get());
        assert!(!self.reporting.get());
        self.reporting.set(true);
        &self.data
    }

    fn reset(&mut self) {
        self.data.clear();
        self.reporting.set(false);
    }
}

#[test]
fn interleaved_producer_and_consumer() {
    let (mut tx, mut rx) = Accumulator::<StrBuf>::new().split();

    let worker = thread::spawn(move || {
        for i in 0..100 {
            tx.accum(format!("{i},"));
        }
    });

    // Overlap report/retire cycles with the producer, holding each
    // snapshot for a while to force the producer through the
    // one-slot-reporting regimes.
    let mut runs: Vec<String> = Vec::new();
    for _ in 0..16 {
        if let Some(snap) = rx.report() {
            thread::sleep(Duration::from_millis(20));
            runs.push(snap.clone());
        } else {
            thread::sleep(Duration::from_millis(20));
        }
    }
    worker.join().unwrap();
    if let Some(snap) = rx.report() {
        runs.push(snap.clone());
    }

    // Each snapshot is an in-order run of consecutive indices, the runs
    // chain without gap or overlap, and together they cover everything
    // the producer sent, "99," included.
    let mut expect = 0u32;
    for run in &runs {
        for part in run.split_terminator(',') {
            let n: u32 = part.parse().unwrap();
            assert_eq!(n, expect, "runs must chain in order: {runs:?}");
            expect += 1;
        }
    }
    assert_eq!(expect, 100);
    assert!(runs.last().unwrap().ends_with("99,"));
}
