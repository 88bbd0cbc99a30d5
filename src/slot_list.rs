//! Storage core shared by the list flavors.
//!
//! A `SlotList` is a pair of growable vectors of nullable slots plus the
//! bookkeeping that makes in-place removal under iteration predictable:
//!
//! - Logical index `i` maps to `fwd[i]` for `i >= 0` and `rev[-1 - i]`
//!   for `i < 0`; `rev` is stored in reverse logical order, so both
//!   append and prepend are O(1) pushes. Logical bounds are
//!   `[-rev.len(), fwd.len())`.
//! - Removal nulls a slot; nothing shifts, so logical indices of the
//!   surviving elements never change while anyone is looking.
//! - The embedded `RcSlot` counts the lookers (cursors). When the count
//!   returns to zero the nulls are stripped and `cached_len` is updated,
//!   so storage stays bounded without ever invalidating a live cursor.
//!
//! `RawCursor` carries the traversal state: the logical window captured
//! at construction (later appends/prepends are invisible), a direction,
//! and a tagged position. The positions past either edge are sentinels —
//! every past-end position is one value, every pre-start position is
//! another — so stepping off the edge saturates instead of overflowing,
//! and one step back re-enters the window.

use crate::refptr::RcSlot;
use std::cell::{Cell, RefCell};

pub(crate) struct SlotList<H> {
    pub(crate) rc: RcSlot,
    fwd: RefCell<Vec<Option<H>>>,
    rev: RefCell<Vec<Option<H>>>, // reverse logical order
    cached_len: Cell<usize>,
}

impl<H> SlotList<H> {
    pub(crate) fn new() -> Self {
        Self {
            rc: RcSlot::new(),
            fwd: RefCell::new(Vec::new()),
            rev: RefCell::new(Vec::new()),
            cached_len: Cell::new(0),
        }
    }

    /// First logical index (inclusive).
    pub(crate) fn start(&self) -> i32 {
        -(self.rev.borrow().len() as i32)
    }

    /// One past the last logical index.
    pub(crate) fn end(&self) -> i32 {
        self.fwd.borrow().len() as i32
    }

    /// Logical width, nulls included.
    pub(crate) fn width(&self) -> usize {
        (self.end() - self.start()) as usize
    }

    pub(crate) fn push_back(&self, h: H) {
        self.fwd.borrow_mut().push(Some(h));
    }

    pub(crate) fn push_front(&self, h: H) {
        self.rev.borrow_mut().push(Some(h));
    }

    /// Borrow the slot at `idx` for the duration of `f`. The borrow is
    /// released before control returns to the caller, so `f` must not
    /// call back into the list.
    pub(crate) fn with<R>(&self, idx: i32, f: impl FnOnce(Option<&H>) -> R) -> R {
        if idx >= 0 {
            f(self.fwd.borrow()[idx as usize].as_ref())
        } else {
            f(self.rev.borrow()[(-1 - idx) as usize].as_ref())
        }
    }

    pub(crate) fn is_null(&self, idx: i32) -> bool {
        self.with(idx, |slot| slot.is_none())
    }

    /// Null out the slot at `idx`, returning the prior content. The
    /// content is handed back (rather than dropped here) so any drop
    /// side effects run after the storage borrow is released.
    pub(crate) fn take(&self, idx: i32) -> Option<H> {
        if idx >= 0 {
            self.fwd.borrow_mut()[idx as usize].take()
        } else {
            self.rev.borrow_mut()[(-1 - idx) as usize].take()
        }
    }

    /// Strip nulled slots if the logical width grew since the last
    /// compaction. Only called on the refcount's zero transition, when
    /// no cursor can be holding an index.
    pub(crate) fn compact_if_grown(&self) {
        if self.width() > self.cached_len.get() {
            self.fwd.borrow_mut().retain(Option::is_some);
            self.rev.borrow_mut().retain(Option::is_some);
            self.cached_len.set(self.width());
        }
    }

    /// Replace the storage with empty vectors, returning the old slots
    /// so their drop side effects run after the structure is consistent.
    pub(crate) fn clear_storage(&mut self) -> (Vec<Option<H>>, Vec<Option<H>>) {
        self.cached_len.set(0);
        (
            std::mem::take(self.fwd.get_mut()),
            std::mem::take(self.rev.get_mut()),
        )
    }

    #[cfg(test)]
    pub(crate) fn physical_width(&self) -> usize {
        self.fwd.borrow().len() + self.rev.borrow().len()
    }
}

/// Traversal position. `Before`/`After` are the pre-start and past-end
/// sentinels; all positions past the same edge compare equal no matter
/// where the cursor left the window.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Pos {
    Before,
    At(i32),
    After,
}

/// Cursor state over a `SlotList`. Holds no reference to the list; the
/// wrapping cursor types pair it with a counted borrow.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawCursor {
    start: i32,
    end: i32,
    pos: Pos,
    dir: i32,
}

impl RawCursor {
    /// Capture the current window of `list` and park at the first
    /// non-null slot from `from` in direction `dir` (`1` or `-1`).
    pub(crate) fn new<H>(list: &SlotList<H>, from: i32, dir: i32) -> Self {
        debug_assert!(dir == 1 || dir == -1);
        let start = list.start();
        let end = list.end();
        Self {
            start,
            end,
            pos: seek(list, start, end, from, dir),
            dir,
        }
    }

    pub(crate) fn index(&self) -> Option<i32> {
        match self.pos {
            Pos::At(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn pos(&self) -> Pos {
        self.pos
    }

    pub(crate) fn dir(&self) -> i32 {
        self.dir
    }

    /// Step one position in the iteration direction, skipping nulls.
    pub(crate) fn advance<H>(&mut self, list: &SlotList<H>) {
        self.step(list, 1);
    }

    /// Step one position against the iteration direction.
    pub(crate) fn retreat<H>(&mut self, list: &SlotList<H>) {
        self.step(list, -1);
    }

    fn step<H>(&mut self, list: &SlotList<H>, sign: i32) {
        let d = self.dir * sign;
        let from = match self.pos {
            Pos::At(i) => i + d,
            // The sentinels absorb further steps outward and re-enter
            // the window on a step back inward.
            Pos::Before => {
                if d > 0 {
                    self.start
                } else {
                    return;
                }
            }
            Pos::After => {
                if d < 0 {
                    self.end - 1
                } else {
                    return;
                }
            }
        };
        self.pos = seek(list, self.start, self.end, from, d);
    }
}

/// Clamp `from` into the window and skip nulls in direction `d`,
/// saturating to a sentinel at the window edge.
fn seek<H>(list: &SlotList<H>, start: i32, end: i32, from: i32, d: i32) -> Pos {
    if d > 0 {
        let mut i = from.max(start);
        while i < end && list.is_null(i) {
            i += 1;
        }
        if i < end {
            Pos::At(i)
        } else {
            Pos::After
        }
    } else {
        let mut i = from.min(end - 1);
        while i >= start && list.is_null(i) {
            i -= 1;
        }
        if i >= start {
            Pos::At(i)
        } else {
            Pos::Before
        }
    }
}
