//! Small fixed set of named process-wide locks.
//!
//! Some subsystems wrap libraries that keep hidden global state and are
//! not safe to enter from two threads at once. Each such subsystem gets a
//! [`GlobalLock`] variant backed by its own static [`Mutex`].
//!
//! # Examples
//!
//! ```
//! use foundation_threads::global::GlobalLock;
//!
//! let _codec = GlobalLock::Codec.lock();
//! // Crypto is independent of Codec.
//! let _crypto = GlobalLock::Crypto.lock();
//! ```

use crate::primitives::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GlobalLock {
    /// Media codec library initialisation and teardown.
    Codec,
    Crypto,
    /// Display server connections.
    Display,
    Compositor,
    /// COM apartment setup.
    #[cfg(windows)]
    ComApartment,
}

#[cfg(not(windows))]
const COUNT: usize = 4;
#[cfg(windows)]
const COUNT: usize = 5;

static LOCKS: [Mutex<()>; COUNT] = [const { Mutex::new(()) }; COUNT];

impl GlobalLock {
    /// Every lock, in index order.
    pub const ALL: [GlobalLock; COUNT] = [
        Self::Codec,
        Self::Crypto,
        Self::Display,
        Self::Compositor,
        #[cfg(windows)]
        Self::ComApartment,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Acquires this lock; see [`global_lock`].
    pub fn lock(self) -> MutexGuard<'static, ()> {
        global_lock(self)
    }
}

/// Acquires the process-wide mutex for `which`, blocking until available.
pub fn global_lock(which: GlobalLock) -> MutexGuard<'static, ()> {
    LOCKS[which.index()].lock()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_declaration_order() {
        for (position, which) in GlobalLock::ALL.iter().enumerate() {
            assert_eq!(which.index(), position);
        }
    }

    /// `WHY`: Unrelated subsystems must not serialise on each other
    /// `WHAT`: Holding one global lock leaves the others free
    #[test]
    fn test_locks_are_independent() {
        let _codec = GlobalLock::Codec.lock();
        assert!(LOCKS[GlobalLock::Codec.index()].is_locked());
        assert!(LOCKS[GlobalLock::Display.index()].try_lock().is_some());
    }
}
