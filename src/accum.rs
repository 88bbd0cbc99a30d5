//! Lock-free double-buffered accumulator.
//!
//! One producer keeps accumulating values into a scratch buffer while
//! one consumer reads a stable snapshot of a previously completed
//! accumulation, without locks and without requiring the buffer type
//! itself to support atomic operations.
//!
//! Summary
//! - Two buffers plus one atomic byte encoding the joint status of both.
//!   Each buffer is EMPTY, ACCUM, VALID or REPORT; the byte pins the
//!   reachable combinations to thirteen codes chosen so that every
//!   transition the protocol needs is a single increment, decrement or
//!   XOR on the whole word. Splitting the status into two atomics would
//!   read better but would tear: "this buffer is now ACCUM" and "that
//!   buffer is now VALID" must move together.
//! - [`Accumulator::split`] hands out a [`Producer`] and a [`Consumer`].
//!   Each is `Send` and neither is `Clone`, so "exactly one producer,
//!   exactly one consumer" is enforced by ownership; `&mut self` on
//!   their methods rules out self-concurrency.
//! - [`Consumer::report`] returns a [`Report`] guard or `None` when no
//!   completed accumulation is available (a normal signal — back off and
//!   retry). The guard derefs to the snapshot; dropping it retires the
//!   snapshot buffer (the producer resets it before reuse).
//!
//! Progress
//! - `accum` is wait-free for the producer: each of the two CAS regimes
//!   falls through at most once before reaching a regime that completes
//!   on plain fetch-adds. `report` retries its CAS only while the
//!   producer is mid-publication.
//!
//! Ordering
//! - Every read-modify-write on the state word is acquire-release, so
//!   buffer writes happen-before the consumer's observation of VALID,
//!   and the consumer's snapshot reads happen-before the producer's
//!   observation of the retired slot.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Buffer contract consumed by the accumulator.
///
/// `Default` provides the initial state of the two internal buffers.
/// The accumulator guarantees that `assign`, `accum` and `reset` are
/// only invoked on a buffer no one else is observing, and that the
/// reference returned by `report` stays valid until the corresponding
/// [`Report`] guard is dropped.
///
/// `accum` receives the value by reference: an accumulation that races
/// with a report is restarted against a fresh buffer, re-delivering the
/// same value.
pub trait Buffer: Default {
    type Value;

    /// Copy-assign from another buffer of the same type.
    fn assign(&mut self, other: &Self);

    /// Fold one value into the buffer, for some sense of "add".
    fn accum(&mut self, value: &Self::Value);

    /// Borrow the accumulated result.
    fn report(&self) -> &Self::Value;

    /// Return to the initial state.
    fn reset(&mut self);
}

// Joint buffer states, named slot0_slot1. The low three bits encode the
// combination; bit 3 distinguishes which slot the current accumulation
// epoch lives in, which also keeps the two all-EMPTY codes (0 and 8)
// apart: after a report retires, the next claim must land on the slot
// that was not just reported.
const EMPTY_EMPTY: u8 = 0;
const ACCUM_EMPTY: u8 = 1;
const VALID_EMPTY: u8 = 2;
const VALID_ACCUM: u8 = 3;
const REPORT_EMPTY: u8 = 4;
const REPORT_ACCUM: u8 = 5;
const REPORT_VALID: u8 = 6;
const EMPTY_EMPTY_ALT: u8 = 8;
const EMPTY_ACCUM: u8 = 9;
const EMPTY_VALID: u8 = 10;
const ACCUM_VALID: u8 = 11;
const EMPTY_REPORT: u8 = 12;
const ACCUM_REPORT: u8 = 13;
const VALID_REPORT: u8 = 14;

/// Shared core: the buffer pair and the state word.
pub struct Accumulator<B> {
    bufs: [UnsafeCell<B>; 2],
    state: AtomicU8,
}

// SAFETY: the state protocol guarantees that at any instant each buffer
// is accessed by at most one side (ACCUM: producer only; REPORT:
// consumer only; the Regime B source is read-shared), with the
// acquire-release RMWs ordering the handoffs.
unsafe impl<B: Send> Sync for Accumulator<B> {}

impl<B: Buffer> Accumulator<B> {
    pub fn new() -> Self {
        Self {
            bufs: [
                UnsafeCell::new(B::default()),
                UnsafeCell::new(B::default()),
            ],
            state: AtomicU8::new(EMPTY_EMPTY),
        }
    }

    /// Split into the two single-owner endpoints.
    pub fn split(self) -> (Producer<B>, Consumer<B>) {
        let shared = Arc::new(self);
        (
            Producer {
                shared: Arc::clone(&shared),
            },
            Consumer { shared },
        )
    }

    /// Exclusive access to the buffer in slot `idx`.
    ///
    /// # Safety
    ///
    /// The caller must have claimed the slot through the state protocol
    /// (an ACCUM transition it owns).
    #[allow(clippy::mut_from_ref)]
    unsafe fn buf_mut(&self, idx: usize) -> &mut B {
        unsafe { &mut *self.bufs[idx].get() }
    }

    /// Shared access to the buffer in slot `idx`.
    ///
    /// # Safety
    ///
    /// The caller must know the slot is not concurrently written (VALID
    /// or REPORT under the state protocol).
    unsafe fn buf_ref(&self, idx: usize) -> &B {
        unsafe { &*self.bufs[idx].get() }
    }

    fn accum_value(&self, value: &B::Value) {
        let mut state = self.state.load(Ordering::Acquire);

        // Single producer: nothing may already be accumulating.
        debug_assert!(
            !matches!(
                state,
                ACCUM_EMPTY | VALID_ACCUM | REPORT_ACCUM | EMPTY_ACCUM | ACCUM_VALID | ACCUM_REPORT
            ),
            "accum while an accumulation is in flight (state {state})"
        );

        // One buffer valid, the other reporting: step the valid buffer
        // to ACCUM and fold into it directly.
        //
        //   REPORT_VALID(6)  -> REPORT_ACCUM(5)
        //   VALID_REPORT(14) -> ACCUM_REPORT(13)
        //
        // The CAS loses only to a simultaneous reset(); the updated
        // state is handled by the regimes below.
        if state == REPORT_VALID || state == VALID_REPORT {
            match self
                .state
                .compare_exchange(state, state - 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let valid_idx = ((state >> 3) ^ 1) as usize;
                    // SAFETY: the CAS moved this slot to ACCUM; only the
                    // producer touches an ACCUM slot.
                    unsafe { self.buf_mut(valid_idx).accum(value) };

                    // A racing reset() may have retired the other slot:
                    //   REPORT_ACCUM(5)  -> EMPTY_ACCUM(9)
                    //   ACCUM_REPORT(13) -> ACCUM_EMPTY(1)
                    // Either way the increment publishes ACCUM -> VALID:
                    //   REPORT_ACCUM(5)  -> REPORT_VALID(6)
                    //   EMPTY_ACCUM(9)   -> EMPTY_VALID(10)
                    //   ACCUM_REPORT(13) -> VALID_REPORT(14)
                    //   ACCUM_EMPTY(1)   -> VALID_EMPTY(2)
                    let after = self.state.fetch_add(1, Ordering::AcqRel) + 1;
                    debug_assert!(
                        matches!(after, VALID_EMPTY | REPORT_VALID | EMPTY_VALID | VALID_REPORT),
                        "unexpected state {after} after publish"
                    );
                    return;
                }
                Err(current) => state = current,
            }
        }

        // One buffer valid, the other empty, no report in flight: claim
        // the empty buffer, copy the valid accumulation into it (leaving
        // the original available for reporting), fold into the copy.
        //
        //   VALID_EMPTY(2)  -> VALID_ACCUM(3)
        //   EMPTY_VALID(10) -> ACCUM_VALID(11)
        //
        // The CAS loses only to a simultaneous report(); the updated
        // state is handled by the regime below.
        if state == VALID_EMPTY || state == EMPTY_VALID {
            match self
                .state
                .compare_exchange(state, state + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let valid_idx = (state >> 3) as usize;
                    let empty_idx = valid_idx ^ 1;
                    // SAFETY: the CAS claimed empty_idx as ACCUM; the
                    // valid slot is read-shared at worst (the consumer
                    // may stamp it REPORT and read it concurrently).
                    unsafe {
                        let dst = self.buf_mut(empty_idx);
                        dst.reset();
                        dst.assign(self.buf_ref(valid_idx));
                        dst.accum(value);
                    }

                    // Publish the copy as the sole valid buffer: mark it
                    // VALID and the original EMPTY in one step, which is
                    // a decrement plus flipping the epoch bit.
                    //
                    //   VALID_ACCUM(3)  -> EMPTY_VALID(10)
                    //   ACCUM_VALID(11) -> VALID_EMPTY(2)
                    let expected = state + 1;
                    if self
                        .state
                        .compare_exchange(
                            expected,
                            (expected - 1) ^ 8,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return;
                    }

                    // A report() stamped the original buffer first. The
                    // half-built copy is stale (the consumer will retire
                    // the data it duplicates), so discard it and fall
                    // through to deliver the value into a fresh buffer.
                    //
                    //   REPORT_ACCUM(5)  -> REPORT_EMPTY(4)
                    //   EMPTY_ACCUM(9)   -> EMPTY_EMPTY_ALT(8)
                    //   ACCUM_REPORT(13) -> EMPTY_REPORT(12)
                    //   ACCUM_EMPTY(1)   -> EMPTY_EMPTY(0)
                    state = self.state.fetch_sub(1, Ordering::AcqRel) - 1;
                    debug_assert!(
                        matches!(
                            state,
                            EMPTY_EMPTY | REPORT_EMPTY | EMPTY_EMPTY_ALT | EMPTY_REPORT
                        ),
                        "unexpected state {state} after discarding copy"
                    );
                }
                Err(current) => state = current,
            }
        }

        // No valid buffer: reset and accumulate into the empty slot that
        // was not part of the last report. The claim is a plain
        // increment; the only concurrent transition from these states is
        // reset()'s XOR 12, which cannot collide with it.
        //
        //   EMPTY_EMPTY(0)     -> ACCUM_EMPTY(1)
        //   REPORT_EMPTY(4)    -> REPORT_ACCUM(5)
        //   EMPTY_EMPTY_ALT(8) -> EMPTY_ACCUM(9)
        //   EMPTY_REPORT(12)   -> ACCUM_REPORT(13)
        if matches!(
            state,
            EMPTY_EMPTY | REPORT_EMPTY | EMPTY_EMPTY_ALT | EMPTY_REPORT
        ) {
            // Bit 3 alone does not name the free slot here: the two
            // all-EMPTY codes claim the slot bit 3 points away from,
            // while the REPORT codes must avoid the reporting slot.
            let empty_idx = (((state >> 3) ^ (state >> 2)) & 1) as usize;

            let claimed = self.state.fetch_add(1, Ordering::AcqRel) + 1;
            debug_assert!(
                matches!(
                    claimed,
                    ACCUM_EMPTY | REPORT_ACCUM | EMPTY_ACCUM | ACCUM_REPORT
                ),
                "unexpected state {claimed} after claim"
            );

            // SAFETY: the increment claimed empty_idx as ACCUM.
            unsafe {
                let buf = self.buf_mut(empty_idx);
                buf.reset();
                buf.accum(value);
            }

            //   ACCUM_EMPTY(1)   -> VALID_EMPTY(2)
            //   REPORT_ACCUM(5)  -> REPORT_VALID(6)
            //   EMPTY_ACCUM(9)   -> EMPTY_VALID(10)
            //   ACCUM_REPORT(13) -> VALID_REPORT(14)
            let after = self.state.fetch_add(1, Ordering::AcqRel) + 1;
            debug_assert!(
                matches!(after, VALID_EMPTY | REPORT_VALID | EMPTY_VALID | VALID_REPORT),
                "unexpected state {after} after publish"
            );
        } else {
            unreachable!("accumulator state {state} has no claimable slot");
        }
    }
}

impl<B: Buffer> Default for Accumulator<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for Accumulator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accumulator")
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish()
    }
}

/// Producer endpoint. Exactly one exists per accumulator.
pub struct Producer<B> {
    shared: Arc<Accumulator<B>>,
}

impl<B: Buffer> Producer<B> {
    /// Fold `value` into the running accumulation.
    ///
    /// Wait-free: never blocks on the consumer. A value delivered while
    /// a report races in lands in a fresh accumulation instead of the
    /// one being reported.
    pub fn accum(&mut self, value: B::Value) {
        self.shared.accum_value(&value);
    }
}

/// Consumer endpoint. Exactly one exists per accumulator.
pub struct Consumer<B> {
    shared: Arc<Accumulator<B>>,
}

impl<B: Buffer> Consumer<B> {
    /// Claim the completed accumulation for reading, if there is one.
    ///
    /// `None` means no buffer has been made valid since the last report
    /// retired; back off and try again later. Holding the returned
    /// guard borrows the consumer, so a second report cannot start until
    /// the snapshot is released.
    pub fn report(&mut self) -> Option<Report<'_, B>> {
        let mut state = self.shared.state.load(Ordering::Acquire);

        // Single consumer: nothing may already be reporting.
        debug_assert!(
            !matches!(
                state,
                REPORT_EMPTY | REPORT_ACCUM | REPORT_VALID | EMPTY_REPORT | ACCUM_REPORT
                    | VALID_REPORT
            ),
            "report while a report is in flight (state {state})"
        );

        // Stamp the valid buffer as REPORT without disturbing the other
        // slot. Retry while the producer's own CAS wins the race.
        //
        //   VALID_EMPTY(2)  -> REPORT_EMPTY(4)
        //   VALID_ACCUM(3)  -> REPORT_ACCUM(5)
        //   EMPTY_VALID(10) -> EMPTY_REPORT(12)
        //   ACCUM_VALID(11) -> ACCUM_REPORT(13)
        while matches!(state, VALID_EMPTY | VALID_ACCUM | EMPTY_VALID | ACCUM_VALID) {
            match self.shared.state.compare_exchange(
                state,
                state + 2,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let valid_idx = (state >> 3) as usize;
                    // SAFETY: the CAS moved this slot to REPORT; the
                    // producer will not touch it until reset.
                    let value = unsafe { self.shared.buf_ref(valid_idx).report() as *const _ };
                    return Some(Report {
                        shared: &*self.shared,
                        value,
                    });
                }
                Err(current) => state = current,
            }
        }

        None
    }
}

/// Stable view of a completed accumulation.
///
/// Dereferences to the snapshot value. Dropping the guard retires the
/// snapshot buffer; its contents are reset lazily, by the producer,
/// before the slot is reused.
pub struct Report<'a, B: Buffer> {
    shared: &'a Accumulator<B>,
    value: *const B::Value,
}

impl<'a, B: Buffer> Deref for Report<'a, B> {
    type Target = B::Value;

    fn deref(&self) -> &B::Value {
        // SAFETY: the slot stays in REPORT until this guard drops, and
        // the producer never writes a REPORT slot.
        unsafe { &*self.value }
    }
}

impl<'a, B: Buffer> Drop for Report<'a, B> {
    fn drop(&mut self) {
        // REPORT -> EMPTY on the reporting slot, other slot untouched:
        //
        //   REPORT_EMPTY(4)  -> EMPTY_EMPTY_ALT(8)
        //   REPORT_ACCUM(5)  -> EMPTY_ACCUM(9)
        //   REPORT_VALID(6)  -> EMPTY_VALID(10)
        //   EMPTY_REPORT(12) -> EMPTY_EMPTY(0)
        //   ACCUM_REPORT(13) -> ACCUM_EMPTY(1)
        //   VALID_REPORT(14) -> VALID_EMPTY(2)
        self.shared.state.fetch_xor(12, Ordering::AcqRel);
    }
}
