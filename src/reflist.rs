//! List of counted refs with fast append and prepend, built to behave
//! predictably when modified during iteration.
//!
//! Contract
//! - A cursor keeps naming the element it was parked on, no matter what
//!   is appended, prepended, or removed around it.
//! - A cursor only ever sees the elements that existed when it was
//!   created; its window never grows.
//! - Removal nulls a slot in place; cursors skip nulls when they step.
//!
//! The list counts its cursors through the same intrusive machinery its
//! elements use: every cursor holds a [`ScopedRef`] to the list, and the
//! list's `last_unref` is not "destroy me" but "no cursor is watching —
//! safe to compact". Destruction, assignment and [`clear`] require that
//! no cursor exists; the borrow checker enforces this statically (the
//! `RcSlot` destructor still asserts it as a backstop).
//!
//! Mutators take `&self`: in-place mutation under live cursors is the
//! point of the container. All access is single-threaded.
//!
//! [`clear`]: RefList::clear

use crate::refptr::{RcSlot, RcTarget, ScopedRef, StrongRef};
use crate::slot_list::{RawCursor, SlotList};
use std::ptr;

pub struct RefList<T: RcTarget> {
    slots: SlotList<StrongRef<T>>,
}

impl<T: RcTarget> RefList<T> {
    pub fn new() -> Self {
        Self {
            slots: SlotList::new(),
        }
    }

    /// Append to the back. O(1); invisible to existing cursors.
    pub fn append(&self, item: StrongRef<T>) {
        assert!(!item.is_null(), "cannot store a null ref");
        self.slots.push_back(item);
    }

    /// Prepend to the front. O(1); invisible to existing cursors.
    pub fn prepend(&self, item: StrongRef<T>) {
        assert!(!item.is_null(), "cannot store a null ref");
        self.slots.push_front(item);
    }

    /// Append every ref yielded by `items`.
    pub fn append_all<I>(&self, items: I)
    where
        I: IntoIterator<Item = StrongRef<T>>,
    {
        for item in items {
            self.append(item);
        }
    }

    /// Null out the first slot naming `target`. Returns whether a match
    /// was found. Existing cursors keep their positions and skip the
    /// null when they next step.
    pub fn remove(&self, target: &T) -> bool {
        let mut cur = self.cursor();
        while let Some(idx) = cur.raw.index() {
            let hit = self.slots.with(idx, |slot| match slot {
                Some(r) => r.is(target),
                None => false,
            });
            if hit {
                let taken = self.slots.take(idx);
                // Retire the cursor first so a pending compaction runs
                // before the element's last_unref can observe the list.
                drop(cur);
                drop(taken);
                return true;
            }
            cur.advance();
        }
        false
    }

    /// Number of live (non-null) elements.
    pub fn len(&self) -> usize {
        let mut cur = self.cursor();
        let mut n = 0;
        while cur.raw.index().is_some() {
            n += 1;
            cur.advance();
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.cursor().raw.index().is_none()
    }

    /// Drop every element. Exclusive access means no cursor can exist.
    pub fn clear(&mut self) {
        assert_eq!(self.slots.rc.get(), 0, "clear with live cursors");
        let old = self.slots.clear_storage();
        // Element drops run here, after the list is consistent again.
        drop(old);
    }

    /// Forward iterator over counted handles to the current elements.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            cursor: self.cursor(),
        }
    }

    /// Reverse iterator.
    pub fn iter_rev(&self) -> Iter<'_, T> {
        Iter {
            cursor: self.cursor_rev(),
        }
    }

    /// Forward cursor, parked on the first element (or past the end of
    /// an empty list).
    pub fn cursor(&self) -> Cursor<'_, T> {
        let from = self.slots.start();
        Cursor {
            list: ScopedRef::new(self),
            raw: RawCursor::new(&self.slots, from, 1),
        }
    }

    /// Reverse cursor, parked on the last element.
    pub fn cursor_rev(&self) -> Cursor<'_, T> {
        let from = self.slots.end() - 1;
        Cursor {
            list: ScopedRef::new(self),
            raw: RawCursor::new(&self.slots, from, -1),
        }
    }

    #[cfg(test)]
    pub(crate) fn physical_width(&self) -> usize {
        self.slots.physical_width()
    }
}

impl<T: RcTarget> Default for RefList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RcTarget> Clone for RefList<T> {
    /// Produces a compacted copy: nulls are omitted, handles are shared.
    fn clone(&self) -> Self {
        let copy = Self::new();
        copy.append_all(self.iter());
        copy
    }
}

impl<T: RcTarget> RcTarget for RefList<T> {
    fn rc_slot(&self) -> &RcSlot {
        &self.slots.rc
    }

    /// The last cursor is gone: compact if removals or additions grew
    /// the slot storage since the previous compaction.
    fn last_unref(&self) {
        self.slots.compact_if_grown();
    }
}

/// Traversal handle. Holds a counted borrow of the list, so compaction
/// is deferred while it exists.
pub struct Cursor<'a, T: RcTarget> {
    list: ScopedRef<'a, RefList<T>>,
    raw: RawCursor,
}

impl<'a, T: RcTarget> Cursor<'a, T> {
    /// Counted handle to the current element. `None` on a sentinel, or
    /// when the slot under the cursor was removed since it parked.
    pub fn get(&self) -> Option<StrongRef<T>> {
        let idx = self.raw.index()?;
        self.list.slots.with(idx, |slot| slot.cloned())
    }

    /// Logical index of the current position, if on an element's slot.
    /// Stable across append/prepend/remove for the life of the cursor.
    pub fn index(&self) -> Option<i32> {
        self.raw.index()
    }

    /// True once the cursor has stepped past either edge of its window.
    pub fn is_done(&self) -> bool {
        self.raw.index().is_none()
    }

    /// Step to the next non-null slot in the cursor's direction.
    pub fn advance(&mut self) {
        self.raw.advance(&self.list.slots);
    }

    /// Step back to the previous non-null slot.
    pub fn retreat(&mut self) {
        self.raw.retreat(&self.list.slots);
    }

    /// Null out the current slot and return its content. `None` if the
    /// slot was already removed by someone else. The cursor stays at the
    /// same index; the next step skips the null.
    pub fn remove(&mut self) -> Option<StrongRef<T>> {
        let idx = self.raw.index().expect("remove past the end");
        self.list.slots.take(idx)
    }
}

impl<'a, T: RcTarget> Clone for Cursor<'a, T> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            raw: self.raw,
        }
    }
}

impl<'a, T: RcTarget> PartialEq for Cursor<'a, T> {
    /// Positions compare by index only; comparing cursors from different
    /// lists or directions is ill-defined.
    fn eq(&self, other: &Self) -> bool {
        debug_assert!(
            ptr::eq::<RefList<T>>(&*self.list, &*other.list) && self.raw.dir() == other.raw.dir(),
            "comparing cursors from different lists or directions"
        );
        self.raw.pos() == other.raw.pos()
    }
}

/// Iterator adapter over a [`Cursor`], yielding counted handles.
pub struct Iter<'a, T: RcTarget> {
    cursor: Cursor<'a, T>,
}

impl<'a, T: RcTarget> Iterator for Iter<'a, T> {
    type Item = StrongRef<T>;

    fn next(&mut self) -> Option<StrongRef<T>> {
        while !self.cursor.is_done() {
            let item = self.cursor.get();
            self.cursor.advance();
            // A slot can be nulled under a parked cursor; skip it.
            if item.is_some() {
                return item;
            }
        }
        None
    }
}
