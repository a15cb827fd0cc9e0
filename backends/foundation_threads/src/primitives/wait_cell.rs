//! Futex-like wait/notify on a single atomic word.
//!
//! A [`WaitCell`] parks the calling thread for as long as its word holds an
//! expected value. Wakers change the word first and then call
//! [`WaitCell::notify_one`] or [`WaitCell::notify_all`]. Parked threads are
//! keyed by the address of the cell inside `parking_lot_core`'s global
//! parking lot, so a cell must not move while anyone waits on it (the
//! `&self` borrow held by the waiter guarantees that).
//!
//! Returns from [`WaitCell::wait`] may be spurious; callers re-check the
//! word.
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::Ordering;
//! use std::sync::Arc;
//! use std::thread;
//!
//! use foundation_threads::primitives::WaitCell;
//!
//! let cell = Arc::new(WaitCell::new(0));
//! let waker = Arc::clone(&cell);
//!
//! let handle = thread::spawn(move || {
//!     waker.store(1, Ordering::Release);
//!     waker.notify_all();
//! });
//!
//! while cell.load(Ordering::Acquire) == 0 {
//!     cell.wait(0);
//! }
//! handle.join().unwrap();
//! ```

use core::fmt;
use core::ops::Deref;
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use std::time::Instant;

use parking_lot_core::{ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// Result of a wait bounded by a deadline.
///
/// Timing out is an expected outcome of a timed wait, so it is reported as
/// a status rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult(bool);

impl WaitTimeoutResult {
    /// Returns `true` if the wait ended because the deadline elapsed.
    #[inline]
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.0
    }

    #[inline]
    pub(crate) const fn new(timed_out: bool) -> Self {
        Self(timed_out)
    }
}

/// Converts a relative timeout into a monotonic deadline.
///
/// `None` means the timeout is too large to represent and the wait is
/// effectively unbounded.
#[inline]
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// An atomic `u32` that threads can block on until it changes.
pub struct WaitCell {
    value: AtomicU32,
}

impl WaitCell {
    /// Creates a cell holding `value`.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
        }
    }

    /// Blocks while the cell holds `expected`.
    ///
    /// Returns immediately if the cell already holds a different value.
    #[inline]
    pub fn wait(&self, expected: u32) {
        let _ = self.park(expected, None);
    }

    /// Blocks while the cell holds `expected`, at most until `deadline`.
    ///
    /// A deadline in the past still checks the value first: a changed value
    /// returns "not timed out" without blocking.
    #[inline]
    pub fn wait_until(&self, expected: u32, deadline: Instant) -> WaitTimeoutResult {
        WaitTimeoutResult::new(matches!(
            self.park(expected, Some(deadline)),
            ParkResult::TimedOut
        ))
    }

    /// Same as [`WaitCell::wait_until`] with an optional deadline.
    #[inline]
    pub(crate) fn wait_deadline(&self, expected: u32, deadline: Option<Instant>) -> WaitTimeoutResult {
        WaitTimeoutResult::new(matches!(
            self.park(expected, deadline),
            ParkResult::TimedOut
        ))
    }

    /// Wakes at most one thread blocked on this cell.
    #[inline]
    pub fn notify_one(&self) {
        // SAFETY: the callback neither panics nor re-enters the parking lot.
        unsafe {
            parking_lot_core::unpark_one(self.key(), |_| DEFAULT_UNPARK_TOKEN);
        }
    }

    /// Wakes every thread blocked on this cell.
    #[inline]
    pub fn notify_all(&self) {
        // SAFETY: no callbacks are involved.
        unsafe {
            parking_lot_core::unpark_all(self.key(), DEFAULT_UNPARK_TOKEN);
        }
    }

    #[inline]
    fn key(&self) -> usize {
        core::ptr::from_ref(self) as usize
    }

    fn park(&self, expected: u32, deadline: Option<Instant>) -> ParkResult {
        // SAFETY: the validation closure only loads an atomic; the other
        // callbacks are empty. None of them panic or touch the parking lot.
        unsafe {
            parking_lot_core::park(
                self.key(),
                || self.value.load(Ordering::Acquire) == expected,
                || {},
                |_, _| {},
                DEFAULT_PARK_TOKEN,
                deadline,
            )
        }
    }
}

impl Deref for WaitCell {
    type Target = AtomicU32;

    #[inline]
    fn deref(&self) -> &AtomicU32 {
        &self.value
    }
}

impl Default for WaitCell {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for WaitCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitCell")
            .field("value", &self.value.load(Ordering::Relaxed))
            .finish()
    }
}
