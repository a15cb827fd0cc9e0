//! Reader-writer lock built from a [`Mutex`] and a [`Condvar`].
//!
//! [`RawRwLock`] keeps one signed state word behind its internal mutex:
//! zero when unheld, the number of readers while read-held and
//! `isize::MIN` while write-held. Readers only wait out a writer, so a
//! thread holding a read lock can always take another one. Writers wait
//! for the word to return to zero. No fairness is enforced: a steady
//! stream of readers can starve a writer.
//!
//! [`RwLock`] wraps the raw lock around a value and hands out guards.
//!
//! # Examples
//!
//! ```
//! use foundation_threads::primitives::RwLock;
//!
//! let lock = RwLock::new(5);
//!
//! {
//!     let r1 = lock.read();
//!     let r2 = lock.read();
//!     assert_eq!(*r1 + *r2, 10);
//! }
//!
//! *lock.write() += 1;
//! assert_eq!(lock.into_inner(), 6);
//! ```

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use super::{Condvar, Mutex};

const UNHELD: isize = 0;
const WRITER: isize = isize::MIN;

/// Snapshot of a [`RawRwLock`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwLockState {
    Unheld,
    /// Held by this many readers.
    Read(usize),
    Write,
}

/// A reader-writer lock with no protected data.
pub struct RawRwLock {
    state: Mutex<isize>,
    wait: Condvar,
}

impl RawRwLock {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(UNHELD),
            wait: Condvar::new(),
        }
    }

    /// Acquires a shared lock, waiting while a writer holds the lock.
    ///
    /// A thread may take several read locks at once.
    ///
    /// Aborts the process if the reader count would overflow.
    pub fn rdlock(&self) {
        let mut state = self.wait.wait_while(self.state.lock(), |state| *state < 0);

        if *state == isize::MAX {
            tracing::error!("reader count overflow on rwlock, aborting");
            std::process::abort();
        }
        *state += 1;
    }

    /// Acquires the exclusive lock, waiting until no thread holds it.
    ///
    /// Taking the write lock again from the writing thread deadlocks.
    pub fn wrlock(&self) {
        let mut state = self
            .wait
            .wait_while(self.state.lock(), |state| *state != UNHELD);
        *state = WRITER;
    }

    /// Releases one hold on the lock.
    ///
    /// Releasing the write lock wakes every waiter; releasing the last
    /// read lock wakes one.
    ///
    /// # Panics
    ///
    /// Panics if the lock is not held.
    pub fn unlock(&self) {
        let mut state = self.state.lock();
        match *state {
            WRITER => {
                *state = UNHELD;
                drop(state);
                self.wait.broadcast();
            }
            readers => {
                assert!(readers > 0, "unlock of an rwlock that is not held");
                *state = readers - 1;
                if *state == UNHELD {
                    drop(state);
                    self.wait.signal();
                }
            }
        }
    }

    /// Number of threads blocked in [`RawRwLock::rdlock`] or
    /// [`RawRwLock::wrlock`].
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.wait.waiters()
    }

    #[must_use]
    pub fn state(&self) -> RwLockState {
        match *self.state.lock() {
            UNHELD => RwLockState::Unheld,
            WRITER => RwLockState::Write,
            readers => RwLockState::Read(readers.unsigned_abs()),
        }
    }
}

impl Default for RawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwLock")
            .field("state", &self.state())
            .finish()
    }
}

/// A reader-writer lock protecting a value.
pub struct RwLock<T: ?Sized> {
    raw: RawRwLock,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for RwLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwLock<T> {}

/// Shared access to an [`RwLock`]'s value; released on drop.
#[must_use = "if unused the RwLock will immediately unlock"]
pub struct RwLockReadGuard<'a, T: ?Sized + 'a> {
    lock: &'a RwLock<T>,
}

/// Exclusive access to an [`RwLock`]'s value; released on drop.
#[must_use = "if unused the RwLock will immediately unlock"]
pub struct RwLockWriteGuard<'a, T: ?Sized + 'a> {
    lock: &'a RwLock<T>,
}

impl<T> RwLock<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            raw: RawRwLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> RwLock<T> {
    /// Locks for shared access. See [`RawRwLock::rdlock`].
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.raw.rdlock();
        RwLockReadGuard { lock: self }
    }

    /// Locks for exclusive access. See [`RawRwLock::wrlock`].
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.raw.wrlock();
        RwLockWriteGuard { lock: self }
    }

    #[must_use]
    pub fn state(&self) -> RwLockState {
        self.raw.state()
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: ?Sized> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: readers only coexist with other readers.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}

impl<T: ?Sized> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the write lock excludes every other holder.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the write lock excludes every other holder.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwLockReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwLockWriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock")
            .field("state", &self.raw.state())
            .finish_non_exhaustive()
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
