//! Per-thread record of the locks the current thread believes it holds.
//!
//! Locks are identified by address. Each thread keeps an ordered map from
//! lock identity to a reference count so the same holder can mark a lock
//! more than once and only becomes "unmarked" after the matching number of
//! [`unmark`] calls.
//!
//! The tracker is a build-time capability: debug builds (or builds with the
//! `lock_marks` feature) use [`OrderedMarks`], everything else uses
//! [`NoMarks`], whose [`marked`] always answers `true` so assertions built
//! on it never fire.
//!
//! # Examples
//!
//! ```
//! use foundation_threads::lockmark;
//!
//! let resource = 0u8;
//! lockmark::mark(&resource);
//! assert!(lockmark::marked(&resource));
//! lockmark::unmark(&resource);
//! ```

use core::fmt;

/// Identity of a lock object: its address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(usize);

impl LockId {
    /// Identity of the object behind `lock`.
    #[inline]
    #[must_use]
    pub fn of<L: ?Sized>(lock: &L) -> Self {
        Self(core::ptr::from_ref(lock).cast::<()>() as usize)
    }
}

impl fmt::Debug for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockId({:#x})", self.0)
    }
}

/// Operations a lock tracker provides.
pub trait LockMarks {
    /// Records one more hold of `lock` by the calling thread.
    fn mark(lock: LockId);

    /// Drops one hold of `lock` by the calling thread.
    ///
    /// # Panics
    ///
    /// Tracking implementations panic if `lock` was never marked.
    fn unmark(lock: LockId);

    /// Whether the calling thread currently holds `lock`.
    fn marked(lock: LockId) -> bool;
}

/// Ordered-map tracker used in debug builds.
#[cfg(any(debug_assertions, feature = "lock_marks"))]
#[derive(Debug, Clone, Copy)]
pub struct OrderedMarks;

#[cfg(any(debug_assertions, feature = "lock_marks"))]
mod ordered {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::{LockId, LockMarks, OrderedMarks};

    thread_local! {
        static MARKS: RefCell<BTreeMap<LockId, usize>> = const { RefCell::new(BTreeMap::new()) };
    }

    impl LockMarks for OrderedMarks {
        fn mark(lock: LockId) {
            // A thread tearing down its locals has nothing left to record.
            let _ = MARKS.try_with(|marks| {
                *marks.borrow_mut().entry(lock).or_insert(0) += 1;
            });
        }

        fn unmark(lock: LockId) {
            let _ = MARKS.try_with(|marks| {
                let mut marks = marks.borrow_mut();
                let refs = marks.get_mut(&lock);
                assert!(refs.is_some(), "unmarking {lock:?} which this thread never marked");

                if let Some(refs) = refs {
                    *refs -= 1;
                    if *refs == 0 {
                        marks.remove(&lock);
                    }
                }
            });
        }

        fn marked(lock: LockId) -> bool {
            MARKS
                .try_with(|marks| marks.borrow().contains_key(&lock))
                .unwrap_or(false)
        }
    }
}

/// Tracker used when lock marking is compiled out.
#[derive(Debug, Clone, Copy)]
pub struct NoMarks;

impl LockMarks for NoMarks {
    #[inline]
    fn mark(_lock: LockId) {}

    #[inline]
    fn unmark(_lock: LockId) {}

    #[inline]
    fn marked(_lock: LockId) -> bool {
        true
    }
}

/// Tracker selected for this build.
#[cfg(any(debug_assertions, feature = "lock_marks"))]
pub type ActiveMarks = OrderedMarks;

/// Tracker selected for this build.
#[cfg(not(any(debug_assertions, feature = "lock_marks")))]
pub type ActiveMarks = NoMarks;

/// Whether this build records lock marks.
pub const TRACKING: bool = cfg!(any(debug_assertions, feature = "lock_marks"));

/// Marks `lock` as held by the calling thread.
#[inline]
pub fn mark<L: ?Sized>(lock: &L) {
    ActiveMarks::mark(LockId::of(lock));
}

/// Releases one mark of `lock` held by the calling thread.
///
/// # Panics
///
/// In tracking builds, panics if `lock` is not marked by this thread.
#[inline]
pub fn unmark<L: ?Sized>(lock: &L) {
    ActiveMarks::unmark(LockId::of(lock));
}

/// Whether the calling thread has marked `lock`.
///
/// Always `true` when tracking is compiled out.
#[inline]
#[must_use]
pub fn marked<L: ?Sized>(lock: &L) -> bool {
    ActiveMarks::marked(LockId::of(lock))
}

/// Asserts that the calling thread holds `lock`.
///
/// # Panics
///
/// Panics in tracking builds when `lock` is not marked.
#[inline]
#[track_caller]
pub fn assert_held<L: ?Sized>(lock: &L) {
    assert!(marked(lock), "{:?} is not held by this thread", LockId::of(lock));
}
