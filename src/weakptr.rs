//! Intrusive weak-reference machinery.
//!
//! Summary
//! - `WeakHead` is the list head a target embeds; `WeakTarget` is the
//!   capability trait that exposes it.
//! - `WeakRef` is a nullable handle that nulls itself when the target is
//!   destroyed: the target's `WeakHead` destructor walks its record list
//!   and clears every record still pointing at it.
//!
//! Records
//! - Each non-null `WeakRef` owns one small heap record (`WeakNode`)
//!   threaded into the target's singly linked list. The record gives the
//!   link a stable address while the handle itself stays freely movable;
//!   a null handle owns no record and costs nothing.
//! - Unlinking walks from the head because the list is singly linked:
//!   O(k) per unlink, k = number of weak refs on that target. A doubly
//!   linked list would be O(1) at the cost of one more pointer per
//!   record; weak-ref counts per target are expected to be small.
//!
//! Constraints
//! - Single-threaded: `Cell`-based links, `!Send`/`!Sync`.
//! - Dereferencing goes through `upgrade`, which takes a strong count;
//!   a dead target upgrades to `None`.

use crate::refptr::{RcTarget, StrongRef};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

/// One record in a target's weak list. Owned by its `WeakRef`; the
/// target only ever borrows it through the links.
struct WeakNode<T> {
    target: Cell<*const T>,
    next: Cell<*mut WeakNode<T>>,
}

/// Embedded head of the weak-record list. One per target that
/// participates in weak referencing.
pub struct WeakHead<T> {
    head: Cell<*mut WeakNode<T>>,
    _not_send: PhantomData<*mut ()>,
}

impl<T> WeakHead<T> {
    pub fn new() -> Self {
        Self {
            head: Cell::new(ptr::null_mut()),
            _not_send: PhantomData,
        }
    }

    /// Number of weak refs currently attached. Linear walk; intended for
    /// diagnostics and tests.
    pub fn attached(&self) -> usize {
        let mut n = 0;
        let mut node = self.head.get();
        while !node.is_null() {
            n += 1;
            // SAFETY: linked nodes are owned by live WeakRefs.
            node = unsafe { (*node).next.get() };
        }
        n
    }
}

impl<T> Default for WeakHead<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for WeakHead<T> {
    fn drop(&mut self) {
        // The target is going away: null every record still pointing at
        // it. The records themselves belong to their WeakRefs.
        let mut node = self.head.get();
        while !node.is_null() {
            // SAFETY: linked nodes are owned by live WeakRefs.
            unsafe {
                let next = (*node).next.get();
                (*node).target.set(ptr::null());
                (*node).next.set(ptr::null_mut());
                node = next;
            }
        }
        self.head.set(ptr::null_mut());
    }
}

impl<T> fmt::Debug for WeakHead<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakHead").field(&self.attached()).finish()
    }
}

/// Capability trait for types that embed a [`WeakHead`].
pub trait WeakTarget: Sized {
    fn weak_head(&self) -> &WeakHead<Self>;
}

/// Nullable handle that auto-nulls when its target is destroyed.
pub struct WeakRef<T: WeakTarget> {
    node: Option<NonNull<WeakNode<T>>>,
}

impl<T: WeakTarget> WeakRef<T> {
    /// The null handle. Owns no record.
    #[inline]
    pub fn null() -> Self {
        Self { node: None }
    }

    /// Weak handle to the target of a non-null strong ref.
    ///
    /// Panics on a null ref.
    pub fn from_ref(r: &StrongRef<T>) -> Self
    where
        T: RcTarget,
    {
        let target = r.as_ref().expect("weak ref requires a non-null target");
        // Stability of the address is inherited from the strong ref's
        // construction contract.
        let mut w = Self::null();
        w.attach(target);
        w
    }

    /// Weak handle to a target embedded in some larger value.
    ///
    /// # Safety
    ///
    /// The target's address must remain stable while this handle (or any
    /// clone of it) is attached. Destruction of the target is fine; that
    /// is the case the auto-null exists for.
    pub unsafe fn from_target(target: &T) -> Self {
        let mut w = Self::null();
        w.attach(target);
        w
    }

    /// Raw target address, for identity comparisons only. Null after the
    /// target has been destroyed.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        match self.node {
            // SAFETY: we own the record.
            Some(n) => unsafe { n.as_ref().target.get() },
            None => ptr::null(),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.as_ptr().is_null()
    }

    /// True if this handle still names `target`.
    #[inline]
    pub fn is(&self, target: &T) -> bool {
        ptr::eq(self.as_ptr(), target)
    }

    /// Take a strong count on the target, if it is still alive.
    pub fn upgrade(&self) -> Option<StrongRef<T>>
    where
        T: RcTarget,
    {
        let p = self.as_ptr();
        if p.is_null() {
            None
        } else {
            // SAFETY: a non-null record means the target has not been
            // destroyed (its WeakHead would have nulled us).
            Some(unsafe { StrongRef::from_target(&*p) })
        }
    }

    /// Detach from the current target (if any) and become null.
    pub fn reset(&mut self) {
        if let Some(node) = self.node.take() {
            Self::unlink(node);
            // SAFETY: the record is owned by this handle and no longer linked.
            unsafe { drop(Box::from_raw(node.as_ptr())) };
        }
    }

    fn attach(&mut self, target: &T) {
        debug_assert!(self.node.is_none());
        let node = Box::into_raw(Box::new(WeakNode {
            target: Cell::new(target as *const T),
            next: Cell::new(ptr::null_mut()),
        }));
        let head = target.weak_head();
        // SAFETY: freshly allocated record.
        unsafe { (*node).next.set(head.head.get()) };
        head.head.set(node);
        self.node = NonNull::new(node);
    }

    /// Remove `node` from its target's list. No-op if the target is
    /// already gone (the head nulled the record first).
    fn unlink(node: NonNull<WeakNode<T>>) {
        // SAFETY: the record is owned by the calling handle.
        let target = unsafe { node.as_ref().target.get() };
        if target.is_null() {
            return;
        }
        // SAFETY: a non-null record means the target is live.
        let head = unsafe { (*target).weak_head() };
        let first = head.head.get();
        if first == node.as_ptr() {
            // SAFETY: linked nodes are owned by live WeakRefs.
            unsafe { head.head.set(node.as_ref().next.get()) };
        } else {
            // Walk from the head; the list is singly linked.
            let mut prior = first;
            // SAFETY: the record is linked, so the walk terminates at it.
            unsafe {
                while (*prior).next.get() != node.as_ptr() {
                    prior = (*prior).next.get();
                }
                (*prior).next.set(node.as_ref().next.get());
            }
        }
        // SAFETY: we own the record.
        unsafe {
            node.as_ref().target.set(ptr::null());
            node.as_ref().next.set(ptr::null_mut());
        }
    }
}

impl<T: WeakTarget> Default for WeakRef<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: WeakTarget> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        let p = self.as_ptr();
        let mut w = Self::null();
        if !p.is_null() {
            // SAFETY: a non-null record means the target is live; the
            // clone inherits the original's stability contract.
            w.attach(unsafe { &*p });
        }
        w
    }
}

impl<T: WeakTarget> Drop for WeakRef<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: WeakTarget> PartialEq for WeakRef<T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.as_ptr(), other.as_ptr())
    }
}

impl<T: WeakTarget + RcTarget> PartialEq<StrongRef<T>> for WeakRef<T> {
    fn eq(&self, other: &StrongRef<T>) -> bool {
        ptr::eq(self.as_ptr(), other.ptr())
    }
}

impl<T: WeakTarget> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakRef").field(&self.as_ptr()).finish()
    }
}
