//! Owning-slot variant of the list: elements are stored in boxes owned
//! by the list, so they cannot outlive it.
//!
//! Shares the storage core with [`RefList`]: split vectors, fixed cursor
//! windows, null-skipping traversal, and compaction gated on the cursor
//! count. What changes is the access discipline. Shared handles make it
//! safe for a `RefList` to be mutated out from under its cursors; owned
//! slots do not, so here exclusive access does the work the shared list
//! leaves to refcounts: mutators take `&mut self`, iteration borrows
//! `&self`, and removal during traversal goes through [`cursor_mut`],
//! which holds the one exclusive borrow for its whole walk.
//!
//! [`RefList`]: crate::RefList
//! [`cursor_mut`]: OwnList::cursor_mut

use crate::refptr::{RcSlot, RcTarget, ScopedRef};
use crate::slot_list::{RawCursor, SlotList};
use std::ptr;

pub struct OwnList<T> {
    slots: SlotList<Box<T>>,
}

impl<T> OwnList<T> {
    pub fn new() -> Self {
        Self {
            slots: SlotList::new(),
        }
    }

    /// Take ownership of `value` and append it. O(1).
    pub fn append(&mut self, value: T) {
        self.slots.push_back(Box::new(value));
    }

    /// Take ownership of `value` and prepend it. O(1).
    pub fn prepend(&mut self, value: T) {
        self.slots.push_front(Box::new(value));
    }

    /// Null out the first slot holding `target` (by identity) and drop
    /// it. Returns whether a match was found.
    pub fn remove(&mut self, target: &T) -> bool {
        let guard = ScopedRef::new(&*self);
        let mut raw = RawCursor::new(&guard.slots, guard.slots.start(), 1);
        while let Some(idx) = raw.index() {
            let hit = guard.slots.with(idx, |slot| match slot {
                Some(b) => ptr::eq::<T>(&**b, target),
                None => false,
            });
            if hit {
                let taken = guard.slots.take(idx);
                drop(guard);
                drop(taken);
                return true;
            }
            raw.advance(&guard.slots);
        }
        false
    }

    /// Number of live (non-null) elements.
    pub fn len(&self) -> usize {
        let guard = ScopedRef::new(self);
        let mut raw = RawCursor::new(&guard.slots, guard.slots.start(), 1);
        let mut n = 0;
        while raw.index().is_some() {
            n += 1;
            raw.advance(&guard.slots);
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        let guard = ScopedRef::new(self);
        RawCursor::new(&guard.slots, guard.slots.start(), 1)
            .index()
            .is_none()
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        let old = self.slots.clear_storage();
        drop(old);
    }

    /// Borrowing iterator over the current elements, front to back.
    pub fn iter(&self) -> OwnIter<'_, T> {
        let guard = ScopedRef::new(self);
        let raw = RawCursor::new(&guard.slots, guard.slots.start(), 1);
        OwnIter { list: guard, raw }
    }

    /// Exclusive cursor for removal during traversal, parked on the
    /// first element.
    pub fn cursor_mut(&mut self) -> CursorMut<'_, T> {
        let guard = ScopedRef::new(&*self);
        let raw = RawCursor::new(&guard.slots, guard.slots.start(), 1);
        CursorMut { list: guard, raw }
    }

    #[cfg(test)]
    pub(crate) fn physical_width(&self) -> usize {
        self.slots.physical_width()
    }
}

impl<T> Default for OwnList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RcTarget for OwnList<T> {
    fn rc_slot(&self) -> &RcSlot {
        &self.slots.rc
    }

    fn last_unref(&self) {
        self.slots.compact_if_grown();
    }
}

/// Borrowing iterator. The exclusive-mutator discipline means no element
/// it yields can be dropped while the list borrow is alive.
pub struct OwnIter<'a, T> {
    list: ScopedRef<'a, OwnList<T>>,
    raw: RawCursor,
}

impl<'a, T> Iterator for OwnIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let idx = self.raw.index()?;
        let item = self.list.slots.with(idx, |slot| {
            slot.map(|b| &**b as *const T)
        });
        self.raw.advance(&self.list.slots);
        // SAFETY: the box's address is stable across vector growth and
        // compaction, and dropping an element requires `&mut OwnList`,
        // which the `'a` borrow excludes.
        item.map(|p| unsafe { &*p })
    }
}

/// Exclusive traversal handle: stepping plus in-place removal.
pub struct CursorMut<'a, T> {
    list: ScopedRef<'a, OwnList<T>>,
    raw: RawCursor,
}

impl<'a, T> CursorMut<'a, T> {
    /// Borrow the current element. `None` on a sentinel or a slot this
    /// cursor already removed.
    pub fn get(&self) -> Option<&T> {
        let idx = self.raw.index()?;
        let item = self.list.slots.with(idx, |slot| {
            slot.map(|b| &**b as *const T)
        });
        // SAFETY: the borrow is tied to `&self`; removal needs `&mut
        // self`, so the element outlives the returned reference.
        item.map(|p| unsafe { &*p })
    }

    /// Logical index of the current position, if on an element's slot.
    pub fn index(&self) -> Option<i32> {
        self.raw.index()
    }

    pub fn is_done(&self) -> bool {
        self.raw.index().is_none()
    }

    pub fn advance(&mut self) {
        self.raw.advance(&self.list.slots);
    }

    pub fn retreat(&mut self) {
        self.raw.retreat(&self.list.slots);
    }

    /// Null out the current slot and reclaim its element. `None` if this
    /// cursor already removed it. The cursor stays at the same index.
    pub fn remove(&mut self) -> Option<Box<T>> {
        let idx = self.raw.index().expect("remove past the end");
        self.list.slots.take(idx)
    }
}
