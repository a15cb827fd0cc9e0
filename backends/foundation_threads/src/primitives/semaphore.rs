//! Counting semaphore whose count word is also its wait address.
//!
//! `post` and `wait` are lock-free compare-exchange loops on a single
//! [`WaitCell`]; a waiter only parks after observing a zero count, and
//! `post` wakes one parked thread after every successful increment.
//!
//! Semaphore waits are not cancellation points.
//!
//! # Examples
//!
//! ```
//! use foundation_threads::primitives::Semaphore;
//!
//! let sem = Semaphore::new(1);
//! sem.wait();
//! assert!(!sem.try_wait());
//! sem.post().unwrap();
//! assert_eq!(sem.value(), 1);
//! ```

use core::fmt;
use core::sync::atomic::Ordering;
use core::time::Duration;
use std::time::Instant;

use crate::errors::{SemaphoreError, SemaphoreResult};

use super::wait_cell::deadline_after;
use super::{WaitCell, WaitTimeoutResult};

/// A counting semaphore with a `u32` count.
pub struct Semaphore {
    value: WaitCell,
}

impl Semaphore {
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self {
            value: WaitCell::new(value),
        }
    }

    /// Increments the count and wakes one waiter.
    ///
    /// # Errors
    ///
    /// [`SemaphoreError::Overflow`] if the count is already `u32::MAX`; the
    /// count is left unchanged.
    pub fn post(&self) -> SemaphoreResult<()> {
        let mut current = self.value.load(Ordering::Relaxed);
        loop {
            if current == u32::MAX {
                return Err(SemaphoreError::Overflow);
            }

            match self.value.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        self.value.notify_one();
        Ok(())
    }

    /// Decrements the count, parking while it is zero.
    pub fn wait(&self) {
        // Guessing 1 saves a load on the uncontended path.
        let mut expected = 1;
        loop {
            if expected == 0 {
                tracing::trace!("semaphore empty, parking");
                self.value.wait(0);
                expected = 1;
                continue;
            }

            match self.value.compare_exchange_weak(
                expected,
                expected - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => expected = observed,
            }
        }
    }

    /// Like [`Semaphore::wait`], giving up at `deadline`.
    ///
    /// A timed-out wait leaves the count untouched.
    pub fn timedwait(&self, deadline: Instant) -> WaitTimeoutResult {
        self.wait_deadline(Some(deadline))
    }

    /// Like [`Semaphore::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> WaitTimeoutResult {
        self.wait_deadline(deadline_after(timeout))
    }

    fn wait_deadline(&self, deadline: Option<Instant>) -> WaitTimeoutResult {
        let mut expected = 1;
        loop {
            if expected == 0 {
                tracing::trace!(?deadline, "semaphore empty, parking with deadline");
                if self.value.wait_deadline(0, deadline).timed_out() {
                    // A unit posted right at the deadline is still taken.
                    return WaitTimeoutResult::new(!self.try_wait());
                }
                expected = 1;
                continue;
            }

            match self.value.compare_exchange_weak(
                expected,
                expected - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return WaitTimeoutResult::new(false),
                Err(observed) => expected = observed,
            }
        }
    }

    /// Decrements the count if it is nonzero, without blocking.
    pub fn try_wait(&self) -> bool {
        let mut current = self.value.load(Ordering::Relaxed);
        while current != 0 {
            match self.value.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    /// Current count. Only a snapshot while other threads are active.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("value", &self.value())
            .finish()
    }
}
