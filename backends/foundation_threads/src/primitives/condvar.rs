//! Condition variable with an explicit FIFO wait queue.
//!
//! Every call to [`Condvar::wait`] queues a waiter record that owns a
//! private [`WaitCell`]. [`Condvar::signal`] pops the oldest waiter and
//! bumps its cell; [`Condvar::broadcast`] detaches the whole queue and
//! bumps every cell. Waiters park on their own cell, so each wake is
//! targeted: a waiter only returns because of a signal, a broadcast, a
//! cancellation request or its deadline.
//!
//! The queue has its own internal lock, separate from the caller's mutex,
//! so signalling without holding the caller's mutex is safe.
//!
//! Waiting is a cancellation point (see [`crate::cancel`]). A cancelled
//! waiter leaves the queue, re-acquires the caller's mutex and then
//! unwinds, which releases the mutex again through the guard's drop. If a
//! signal had already picked the cancelled waiter, it signals the next
//! waiter before unwinding so the wake is not lost.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use foundation_threads::primitives::{Condvar, Mutex};
//!
//! let pair = Arc::new((Mutex::new(false), Condvar::new()));
//! let pair2 = Arc::clone(&pair);
//!
//! thread::spawn(move || {
//!     let (lock, cvar) = &*pair2;
//!     *lock.lock() = true;
//!     cvar.signal();
//! });
//!
//! let (lock, cvar) = &*pair;
//! let mut ready = lock.lock();
//! while !*ready {
//!     ready = cvar.wait(ready);
//! }
//! ```

use core::fmt;
use core::sync::atomic::Ordering;
use core::time::Duration;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::cancel;

use super::wait_cell::deadline_after;
use super::wait_queue::{Entry, WaitQueue};
use super::{Mutex, MutexGuard, WaitCell, WaitTimeoutResult};

/// A condition variable usable with [`Mutex`].
pub struct Condvar {
    queue: Mutex<WaitQueue<Arc<WaitCell>>>,
}

/// One thread's stay in the wait queue.
///
/// Dropping it unlinks the waiter (a no-op once a signal or broadcast has
/// already done so) and clears the thread's cancel address, on every exit
/// path including unwinding.
struct Waiter<'c> {
    condvar: &'c Condvar,
    entry: Entry,
    cell: Arc<WaitCell>,
}

impl<'c> Waiter<'c> {
    fn enqueue(condvar: &'c Condvar) -> Self {
        let cell = Arc::new(WaitCell::new(0));
        let entry = condvar.queue.lock().push_back(Arc::clone(&cell));
        cancel::set_cancel_address(&cell);

        tracing::trace!(?entry, "waiter queued");
        Self {
            condvar,
            entry,
            cell,
        }
    }

    /// Leaves the queue. Returns `true` if a signal or broadcast had
    /// already removed this waiter, i.e. the waiter holds a wake.
    fn leave(&self) -> bool {
        self.condvar.queue.lock().remove(self.entry).is_none()
    }

    /// Parks until the private cell becomes nonzero or `deadline` passes.
    fn park(&self, deadline: Option<Instant>) -> WaitTimeoutResult {
        loop {
            if self.cell.load(Ordering::Acquire) != 0 {
                return WaitTimeoutResult::new(false);
            }

            if self.cell.wait_deadline(0, deadline).timed_out() {
                // A wake racing with the deadline still counts as a wake.
                return WaitTimeoutResult::new(self.cell.load(Ordering::Acquire) == 0);
            }
        }
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.condvar.queue.lock().remove(self.entry);
        cancel::clear_cancel_address(&self.cell);
    }
}

fn wake(cell: &WaitCell) {
    cell.fetch_add(1, Ordering::Release);
    cell.notify_one();
}

impl Condvar {
    /// Creates a condition variable with an empty queue.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(WaitQueue::new()),
        }
    }

    /// Blocks until signalled, releasing `guard`'s mutex meanwhile.
    ///
    /// The mutex is held again when this returns.
    pub fn wait<'a, T: ?Sized>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.wait_inner(guard, None).0
    }

    /// Like [`Condvar::wait`], giving up at `deadline`.
    pub fn timedwait<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Instant,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        self.wait_inner(guard, Some(deadline))
    }

    /// Like [`Condvar::timedwait`] with a wall-clock deadline.
    ///
    /// The deadline is converted to the monotonic clock when the call
    /// starts; later wall-clock adjustments are not followed.
    pub fn timedwait_daytime<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: SystemTime,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        let remaining = deadline
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        self.wait_inner(guard, deadline_after(remaining))
    }

    /// Like [`Condvar::wait`], giving up after `timeout`.
    pub fn wait_timeout<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        self.wait_inner(guard, deadline_after(timeout))
    }

    /// Waits for as long as `condition` holds.
    pub fn wait_while<'a, T: ?Sized, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut condition: F,
    ) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut *guard) {
            guard = self.wait(guard);
        }
        guard
    }

    /// Waits for as long as `condition` holds, at most `timeout` in total.
    ///
    /// The result reports a timeout only if `condition` still holds.
    pub fn wait_timeout_while<'a, T: ?Sized, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        timeout: Duration,
        mut condition: F,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult)
    where
        F: FnMut(&mut T) -> bool,
    {
        let deadline = deadline_after(timeout);
        loop {
            if !condition(&mut *guard) {
                return (guard, WaitTimeoutResult::new(false));
            }

            let (next, result) = self.wait_inner(guard, deadline);
            guard = next;

            if result.timed_out() {
                let timed_out = condition(&mut *guard);
                return (guard, WaitTimeoutResult::new(timed_out));
            }
        }
    }

    fn wait_inner<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, T>, WaitTimeoutResult) {
        let mutex = guard.mutex();
        let waiter = Waiter::enqueue(self);

        // A request that arrived before the address was registered.
        cancel::test_cancel_with(|| self.pass_on(waiter.leave()));
        drop(guard);

        let result = waiter.park(deadline);
        let woken = waiter.leave();
        drop(waiter);

        let guard = mutex.lock();
        cancel::test_cancel_with(|| self.pass_on(woken));
        (guard, result)
    }

    /// A cancelled waiter must not swallow a wake meant for another
    /// waiter, so it hands the wake to the next one in line.
    fn pass_on(&self, woken: bool) {
        if woken {
            tracing::trace!("cancelled waiter passing its wake on");
            self.signal();
        }
    }

    /// Wakes the longest-waiting thread, if any.
    pub fn signal(&self) {
        let mut queue = self.queue.lock();
        if let Some(cell) = queue.pop_front() {
            tracing::trace!(remaining = queue.len(), "signalling waiter");
            wake(&cell);
        }
    }

    /// Wakes every queued thread.
    pub fn broadcast(&self) {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return;
        }

        let detached = queue.detach();
        tracing::trace!(woken = detached.len(), "broadcasting to waiters");
        for cell in &detached {
            wake(cell);
        }
    }

    /// Number of threads currently queued.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        let queued = self.queue.get_mut().len();
        assert!(
            queued == 0,
            "condition variable dropped with {queued} queued waiter(s)"
        );
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_and_broadcast_without_waiters() {
        let condvar = Condvar::new();
        condvar.signal();
        condvar.broadcast();
        assert_eq!(condvar.waiters(), 0);
    }

    /// `WHY`: Timeouts are an expected outcome
    /// `WHAT`: An unsignalled timed wait reports a timeout and relocks
    #[test]
    fn test_timedwait_times_out_and_relocks() {
        let mutex = Mutex::new(5);
        let condvar = Condvar::new();

        let guard = mutex.lock();
        let (guard, result) =
            condvar.timedwait(guard, Instant::now() + Duration::from_millis(20));
        assert!(result.timed_out());
        assert_eq!(*guard, 5);
        assert!(mutex.is_locked());
        assert_eq!(condvar.waiters(), 0);
    }

    #[test]
    fn test_daytime_deadline_in_past_times_out() {
        let mutex = Mutex::new(());
        let condvar = Condvar::new();
        let past = SystemTime::now() - Duration::from_secs(1);

        let (_guard, result) = condvar.timedwait_daytime(mutex.lock(), past);
        assert!(result.timed_out());
    }

    /// `WHY`: A signal must reach a fully queued waiter
    /// `WHAT`: Signalling after the waiter released the mutex wakes it
    #[test]
    fn test_signal_wakes_queued_waiter() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let pair2 = Arc::clone(&pair);

        let waiter = thread::spawn(move || {
            let (lock, cvar) = &*pair2;
            let mut ready = lock.lock();
            while !*ready {
                ready = cvar.wait(ready);
            }
        });

        let (lock, cvar) = &*pair;
        while cvar.waiters() == 0 {
            thread::yield_now();
        }
        *lock.lock() = true;
        cvar.signal();
        waiter.join().unwrap();
        assert_eq!(cvar.waiters(), 0);
    }

    #[test]
    fn test_wait_timeout_while_reports_condition() {
        let mutex = Mutex::new(0);
        let condvar = Condvar::new();

        let (guard, result) =
            condvar.wait_timeout_while(mutex.lock(), Duration::from_millis(10), |v| *v == 0);
        assert!(result.timed_out());
        drop(guard);

        let (_guard, result) =
            condvar.wait_timeout_while(mutex.lock(), Duration::from_millis(10), |v| *v != 0);
        assert!(!result.timed_out());
    }

    /// `WHY`: A condition variable must outlive its waiters
    /// `WHAT`: Dropping with a queued waiter panics
    #[test]
    #[should_panic(expected = "queued waiter")]
    fn test_drop_with_queued_waiter_panics() {
        let condvar = Condvar::new();
        let waiter = Waiter::enqueue(&condvar);
        core::mem::forget(waiter);
        drop(condvar);
    }
}
