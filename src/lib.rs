//! rc-reflist: intrusive ownership building blocks — counted and weak
//! references over embedded bookkeeping, a list that stays iterable
//! while it is mutated, and a lock-free double-buffered accumulator.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: make each primitive safe to reason about on its own, with the
//!   tricky state confined to one small core per concern.
//! - Layers:
//!   - refptr: the embedded count (`RcSlot`), the capability trait
//!     (`RcTarget`), and the handle family (`StrongRef`, `FirmRef`,
//!     `ScopedRef`) plus the two stock target policies (`RefOwned`,
//!     `RefGuarded`).
//!   - weakptr: the embedded weak-list head (`WeakHead`, `WeakTarget`)
//!     and the auto-nulling `WeakRef`.
//!   - slot_list: private storage core — split vectors, logical
//!     indexing, fixed cursor windows, null-skipping traversal, and
//!     compaction gated on the cursor count.
//!   - reflist / own_list: the two public list flavors over the core,
//!     differing in slot ownership and therefore in access discipline.
//!   - accum: the producer/consumer accumulator over two buffers and a
//!     single atomic state word.
//!
//! Constraints
//! - The reference and list machinery is single-threaded by design:
//!   `Cell`-based counts, `!Send`/`!Sync`. Only the accumulator is a
//!   concurrency primitive, and it is exactly single-producer,
//!   single-consumer, enforced by the ownership of its endpoints.
//! - Counts live inside targets (intrusive): no control-block
//!   allocation, free conversion from raw handles, cheap weak refs. The
//!   price is that targets opt in by embedding a slot and implementing a
//!   capability trait.
//! - Structural misuse — destroying a target with live handles,
//!   clearing a list under a cursor, removing through a finished cursor
//!   — is a programming error: asserted, never defended. Where the
//!   borrow checker can enforce the rule statically, it does, and the
//!   assertion remains as a backstop.
//!
//! Why this split?
//! - Localize invariants: the accumulator's state-word protocol and the
//!   lists' compaction gate are each confined to one module with the
//!   reasoning written next to the transitions.
//! - Minimize unsafe: raw pointers live in the reference machinery and
//!   the accumulator's buffer cells; the list structure above them is
//!   safe code over `RefCell`/`Cell`.
//! - Clear failure boundaries: storage borrows are never held across
//!   calls into user code (element drops and `last_unref` run after the
//!   structure is consistent again).

mod accum;
mod own_list;
mod refptr;
mod reflist;
mod slot_list;
mod weakptr;

// Public surface
pub use accum::{Accumulator, Buffer, Consumer, Producer, Report};
pub use own_list::{CursorMut, OwnIter, OwnList};
pub use refptr::{
    release_boxed, FirmRef, RcSlot, RcTarget, RefGuarded, RefOwned, ScopedRef, StrongRef,
};
pub use reflist::{Cursor, Iter, RefList};
pub use weakptr::{WeakHead, WeakRef, WeakTarget};
