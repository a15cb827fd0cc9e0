//! Cooperative thread cancellation.
//!
//! A thread started with [`spawn`] owns a cancel state. Another thread can
//! request cancellation through [`CancellableThread::cancel`]; the request
//! is only acted upon at cancellation points, where [`test_cancel`] unwinds
//! the current thread with a [`Cancelled`] payload. Scoped cleanup (drop
//! guards) runs during that unwind and [`spawn`] catches it at the thread
//! boundary, reporting [`JoinError::Cancelled`] from
//! [`CancellableThread::join`].
//!
//! Blocking waits register a private [`WaitCell`] as the thread's cancel
//! address before parking. A cancel request bumps that cell and wakes it,
//! so a parked thread notices the request promptly.
//!
//! Threads not started through [`spawn`] have no cancel state; every
//! function here is a no-op for them.

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cleanup::Cleanup;
use crate::errors::{JoinError, JoinResult};
use crate::primitives::WaitCell;

/// Unwind payload carried by a delivered cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Default)]
struct CancelState {
    requested: AtomicBool,
    address: spin::Mutex<Option<Arc<WaitCell>>>,
}

impl CancelState {
    fn request(&self) {
        self.requested.store(true, Ordering::Release);

        // Registration takes the same lock, so a waiter either sees the
        // flag after registering or is woken here.
        if let Some(cell) = self.address.lock().as_ref() {
            cell.fetch_add(1, Ordering::Release);
            cell.notify_all();
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<CancelState>>> = const { RefCell::new(None) };
    static MASK_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn with_current<R>(f: impl FnOnce(&CancelState) -> R) -> Option<R> {
    CURRENT
        .try_with(|current| current.borrow().as_deref().map(f))
        .ok()
        .flatten()
}

/// Whether a cancellation request is pending for the calling thread.
///
/// Ignores masking.
#[must_use]
pub fn is_cancelled() -> bool {
    with_current(|state| state.requested.load(Ordering::Acquire)).unwrap_or(false)
}

/// Cancellation point: unwinds the calling thread if a request is pending.
///
/// Does nothing while cancellation is masked, or when the thread is
/// already unwinding.
pub fn test_cancel() {
    test_cancel_with(|| {});
}

/// Like [`test_cancel`], running `before_unwind` only when a cancellation
/// is actually delivered.
pub(crate) fn test_cancel_with(before_unwind: impl FnOnce()) {
    if MASK_DEPTH.try_with(Cell::get).unwrap_or(0) > 0 || thread::panicking() {
        return;
    }

    if is_cancelled() {
        before_unwind();
        tracing::debug!(
            thread = ?thread::current().name(),
            "delivering pending cancellation"
        );
        panic::resume_unwind(Box::new(Cancelled));
    }
}

/// Registers `cell` as the calling thread's cancel address.
///
/// A later cancel request increments the cell and wakes all its waiters.
pub fn set_cancel_address(cell: &Arc<WaitCell>) {
    with_current(|state| {
        let mut address = state.address.lock();
        debug_assert!(address.is_none(), "cancel address registered twice");
        *address = Some(Arc::clone(cell));
    });
}

/// Clears the cancel address previously registered with `cell`.
pub fn clear_cancel_address(cell: &Arc<WaitCell>) {
    with_current(|state| {
        let mut address = state.address.lock();
        debug_assert!(
            address.as_ref().is_none_or(|current| Arc::ptr_eq(current, cell)),
            "clearing a cancel address that was not registered"
        );
        *address = None;
    });
}

/// Defers cancellation delivery while alive.
///
/// Masks nest; delivery resumes once the outermost mask is dropped and the
/// thread reaches its next cancellation point.
#[must_use = "cancellation is unmasked as soon as the mask is dropped"]
#[derive(Debug)]
pub struct CancelMask {
    _not_send: PhantomData<*const ()>,
}

/// Masks cancellation for the calling thread until the returned guard drops.
pub fn mask_cancellation() -> CancelMask {
    let _ = MASK_DEPTH.try_with(|depth| depth.set(depth.get() + 1));
    CancelMask {
        _not_send: PhantomData,
    }
}

impl Drop for CancelMask {
    fn drop(&mut self) {
        let _ = MASK_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Cloneable handle that cancels a thread without owning its join handle.
#[derive(Debug, Clone)]
pub struct Canceller {
    state: Arc<CancelState>,
}

impl Canceller {
    /// See [`CancellableThread::cancel`].
    pub fn cancel(&self) {
        tracing::debug!("cancellation requested through canceller");
        self.state.request();
    }
}

/// Join handle of a thread started with [`spawn`].
#[derive(Debug)]
pub struct CancellableThread<T> {
    handle: JoinHandle<JoinResult<T>>,
    state: Arc<CancelState>,
}

impl<T> CancellableThread<T> {
    /// Requests cancellation; the thread acts on it at its next
    /// cancellation point.
    pub fn cancel(&self) {
        tracing::debug!(thread = ?self.handle.thread().name(), "cancellation requested");
        self.state.request();
    }

    /// A handle other threads can use to cancel this one.
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        Canceller {
            state: Arc::clone(&self.state),
        }
    }

    /// The underlying thread.
    #[must_use]
    pub fn thread(&self) -> &thread::Thread {
        self.handle.thread()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the thread to finish.
    ///
    /// # Errors
    ///
    /// [`JoinError::Cancelled`] if the thread acted on a cancellation
    /// request, [`JoinError::Panicked`] if it panicked.
    pub fn join(self) -> JoinResult<T> {
        match self.handle.join() {
            Ok(result) => result,
            Err(payload) => Err(JoinError::Panicked(payload)),
        }
    }
}

/// Starts a named thread that can be cancelled.
///
/// # Errors
///
/// Returns the OS error if the thread could not be created.
pub fn spawn<F, T>(name: impl Into<String>, body: F) -> io::Result<CancellableThread<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::new(CancelState::default());
    let thread_state = Arc::clone(&state);

    let handle = thread::Builder::new().name(name.into()).spawn(move || {
        CURRENT.with(|current| *current.borrow_mut() = Some(thread_state));
        let _detach = Cleanup::new(|| {
            let _ = CURRENT.try_with(|current| current.borrow_mut().take());
        });

        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(value) => Ok(value),
            Err(payload) if payload.is::<Cancelled>() => {
                tracing::debug!(thread = ?thread::current().name(), "thread cancelled");
                Err(JoinError::Cancelled)
            }
            Err(payload) => panic::resume_unwind(payload),
        }
    })?;

    Ok(CancellableThread { handle, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// `WHY`: Cancellation is opt-in per thread
    /// `WHAT`: Plain threads never unwind from `test_cancel`
    #[test]
    fn test_plain_thread_is_never_cancelled() {
        assert!(!is_cancelled());
        test_cancel();
        let cell = Arc::new(WaitCell::new(0));
        set_cancel_address(&cell);
        clear_cancel_address(&cell);
    }

    /// `WHY`: Requests are delivered at cancellation points
    /// `WHAT`: A thread polling `test_cancel` joins as cancelled
    #[test]
    fn test_cancel_delivered_at_checkpoint() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&cleanups);

        let worker = spawn("poller", move || {
            let _cleanup = Cleanup::new(|| {
                counted.fetch_add(1, Ordering::SeqCst);
            });
            loop {
                test_cancel();
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        worker.cancel();
        let result = worker.join();
        assert!(matches!(result, Err(JoinError::Cancelled)));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    /// `WHY`: Masked sections must complete
    /// `WHAT`: A request made under a mask is delivered after unmasking
    #[test]
    fn test_mask_defers_delivery() {
        let (tx, rx) = std::sync::mpsc::channel();
        let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

        let worker = spawn("masked", move || {
            let mask = mask_cancellation();
            go_rx.recv().unwrap();
            test_cancel();
            tx.send("survived mask").unwrap();
            drop(mask);
            test_cancel();
            unreachable!("cancellation should be delivered once unmasked");
        })
        .unwrap();

        worker.cancel();
        go_tx.send(()).unwrap();
        assert_eq!(rx.recv().unwrap(), "survived mask");
        assert!(worker.join().unwrap_err().is_cancelled());
    }

    /// `WHY`: Parked threads must notice requests promptly
    /// `WHAT`: A registered address is bumped and woken by `cancel`
    #[test]
    fn test_cancel_wakes_registered_address() {
        let cell = Arc::new(WaitCell::new(0));
        let registered = Arc::clone(&cell);
        let (tx, rx) = std::sync::mpsc::channel();

        let worker = spawn("parked", move || {
            set_cancel_address(&registered);
            tx.send(()).unwrap();
            while registered.load(Ordering::Acquire) == 0 {
                registered.wait(0);
            }
            clear_cancel_address(&registered);
            test_cancel();
        })
        .unwrap();

        rx.recv().unwrap();
        worker.cancel();
        assert!(worker.join().unwrap_err().is_cancelled());
        assert_eq!(cell.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_canceller_outlives_join_handle_use() {
        let worker = spawn("remote", || loop {
            test_cancel();
            thread::sleep(Duration::from_millis(1));
        })
        .unwrap();

        let canceller = worker.canceller();
        thread::spawn(move || canceller.cancel()).join().unwrap();
        assert!(worker.join().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_panics_are_reported() {
        let worker = spawn("panicker", || -> u32 { panic!("boom") }).unwrap();
        assert!(matches!(worker.join(), Err(JoinError::Panicked(_))));
    }

    #[test]
    fn test_value_is_returned() {
        let worker = spawn("adder", || 2 + 2).unwrap();
        assert_eq!(worker.join().unwrap(), 4);
    }
}
