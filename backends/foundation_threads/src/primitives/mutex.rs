//! Non-reentrant mutex parked on a [`WaitCell`].
//!
//! This is the lock every other primitive in the crate builds on: the
//! condition variable guards its wait queue with one, the reader-writer
//! lock keeps its state word inside one, and callers hand their own
//! [`MutexGuard`] to [`Condvar::wait`](super::Condvar::wait).
//!
//! # Examples
//!
//! ```
//! use foundation_threads::primitives::Mutex;
//!
//! let mutex = Mutex::new(0);
//!
//! {
//!     let mut guard = mutex.lock();
//!     *guard += 1;
//! } // Lock released here
//!
//! if let Some(guard) = mutex.try_lock() {
//!     assert_eq!(*guard, 1);
//! };
//! ```

use core::cell::UnsafeCell;
use core::fmt;
use core::hint;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::Ordering;

use crate::lockmark;

use super::WaitCell;

// State encoding:
// 0: unlocked
// 1: locked, nobody parked
// 2: locked, at least one thread may be parked
const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

const SPIN_LIMIT: u32 = 100;

/// A mutual exclusion lock that parks contending threads.
///
/// Relocking from the owning thread deadlocks; debug builds catch it
/// through the lock tracker before parking.
pub struct Mutex<T: ?Sized> {
    state: WaitCell,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

/// RAII guard for [`Mutex`]; the lock is released on drop.
///
/// Guards stay on the thread that locked, since lock marks are per thread.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized + 'a> {
    mutex: &'a Mutex<T>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<T> Mutex<T> {
    /// Creates a new unlocked mutex.
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            state: WaitCell::new(UNLOCKED),
            data: UnsafeCell::new(data),
        }
    }

    /// Consumes the mutex and returns the inner value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the mutex, blocking until it becomes available.
    ///
    /// # Panics
    ///
    /// In lock-tracking builds, panics if the calling thread already holds
    /// this mutex.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_contended();
        }
        self.guard()
    }

    #[cold]
    fn lock_contended(&self) {
        if lockmark::TRACKING {
            assert!(
                !lockmark::marked(self),
                "recursive lock of a non-reentrant mutex"
            );
        }

        let mut state = self.spin();

        if state == UNLOCKED {
            match self.state.compare_exchange(
                UNLOCKED,
                LOCKED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => state = current,
            }
        }

        loop {
            // Announce a parked thread so the holder knows to wake someone.
            if state != CONTENDED && self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                return;
            }

            self.state.wait(CONTENDED);
            state = self.spin();
        }
    }

    fn spin(&self) -> u32 {
        let mut spins = SPIN_LIMIT;
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state != LOCKED || spins == 0 {
                return state;
            }
            hint::spin_loop();
            spins -= 1;
        }
    }

    /// Attempts to acquire the mutex without blocking.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| self.guard())
    }

    /// Whether some thread currently holds the mutex.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    /// Whether the calling thread holds the mutex.
    ///
    /// Only meaningful in lock-tracking builds; otherwise always `true`.
    #[inline]
    pub fn held(&self) -> bool {
        lockmark::marked(self)
    }

    /// Returns a mutable reference to the underlying data.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    #[inline]
    fn guard(&self) -> MutexGuard<'_, T> {
        lockmark::mark(self);
        MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    #[inline]
    fn unlock(&self) {
        lockmark::unmark(self);
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            self.state.notify_one();
        }
    }
}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    /// Returns a reference to the parent mutex.
    #[inline]
    #[must_use]
    pub fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish_non_exhaustive()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}
