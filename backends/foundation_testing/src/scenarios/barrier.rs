//! Reusable barrier built on `Condvar::broadcast`.

use foundation_threads::primitives::{Condvar, Mutex};
use std::sync::Arc;

/// A barrier that blocks threads until all of them have reached it.
///
/// # Examples
///
/// ```
/// use foundation_testing::scenarios::Barrier;
/// use std::thread;
///
/// let barrier = Barrier::new(3);
/// let handles: Vec<_> = (0..3)
///     .map(|_| {
///         let barrier = barrier.clone();
///         thread::spawn(move || barrier.wait())
///     })
///     .collect();
///
/// let leaders = handles
///     .into_iter()
///     .map(|handle| handle.join().unwrap())
///     .filter(|is_leader| *is_leader)
///     .count();
/// assert_eq!(leaders, 1);
/// ```
pub struct Barrier {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<BarrierState>,
    condvar: Condvar,
    num_threads: usize,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
}

impl Barrier {
    /// # Panics
    ///
    /// Panics if `num_threads` is 0.
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "barrier num_threads must be > 0");

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BarrierState {
                    arrived: 0,
                    generation: 0,
                }),
                condvar: Condvar::new(),
                num_threads,
            }),
        }
    }

    /// Blocks until `num_threads` threads have called `wait` in the
    /// current round.
    ///
    /// Returns `true` for exactly one thread per round, the last to arrive.
    #[must_use]
    pub fn wait(&self) -> bool {
        let mut state = self.inner.state.lock();
        let round = state.generation;
        state.arrived += 1;

        if state.arrived < self.inner.num_threads {
            let _state = self
                .inner
                .condvar
                .wait_while(state, |state| state.generation == round);
            return false;
        }

        state.arrived = 0;
        state.generation += 1;
        drop(state);
        self.inner.condvar.broadcast();
        true
    }
}

impl Clone for Barrier {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
