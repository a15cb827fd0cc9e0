//! Stress test framework for synchronization primitives.
//!
//! Provides configurable high-contention testing with:
//! - Thread count control
//! - Iteration limits
//! - Time-based duration
//! - Success rate tracking
//!
//! Workers are cancellable threads released together through a semaphore
//! gate, so every worker starts contending at the same moment. A time
//! limit is enforced by cancelling the workers once it elapses.

use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use foundation_threads::cancel::{self, CancellableThread};
use foundation_threads::primitives::Semaphore;
use foundation_threads::sleep;
use foundation_threads::JoinError;

pub mod config;
pub mod sync;

pub use config::StressConfig;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations completed successfully
    pub successes: usize,
    /// Total operations that failed
    pub failures: usize,
    /// Workers stopped by the time limit
    pub cancelled: usize,
    /// Total time taken for the test
    pub duration: Duration,
    /// Number of threads used
    pub thread_count: usize,
}

impl StressResult {
    #[must_use]
    pub const fn new(
        successes: usize,
        failures: usize,
        cancelled: usize,
        duration: Duration,
        thread_count: usize,
    ) -> Self {
        Self {
            successes,
            failures,
            cancelled,
            duration,
            thread_count,
        }
    }

    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.successes + self.failures
    }

    /// Returns the success rate as a value between 0.0 and 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_operations() == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_operations() as f64
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn operations_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_operations() as f64 / secs
        }
    }
}

/// Base stress test harness.
///
/// Spawns multiple threads that execute a closure repeatedly
/// until the test completes (based on iteration count or duration).
pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs a stress test with the given operation closure.
    ///
    /// The closure receives:
    /// - `thread_id`: Index of the thread (`0..thread_count`)
    /// - `iteration`: Iteration number for this thread
    ///
    /// Returns `true` on success, `false` on failure.
    ///
    /// Workers run as cancellable threads, so an operation blocked in a
    /// condition variable wait or a sleep is stopped by the time limit.
    ///
    /// # Examples
    ///
    /// ```
    /// use foundation_testing::stress::{StressConfig, StressHarness};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let config = StressConfig::new().threads(4).iterations(100);
    /// let harness = StressHarness::new(config);
    ///
    /// let counter_clone = Arc::clone(&counter);
    /// let result = harness.run(move |_thread_id, _iteration| {
    ///     counter_clone.fetch_add(1, Ordering::Relaxed);
    ///     true
    /// });
    ///
    /// assert_eq!(counter.load(Ordering::Relaxed), 400); // 4 threads * 100 iterations
    /// assert_eq!(result.successes, 400);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if a worker thread cannot be spawned, or re-raises the panic
    /// of any worker that panicked.
    pub fn run<F>(self, operation: F) -> StressResult
    where
        F: Fn(usize, usize) -> bool + Send + Sync + 'static,
    {
        let thread_count = self.config.get_thread_count();
        let iterations = self.config.get_iterations();

        let operation = Arc::new(operation);
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let mut workers: Vec<CancellableThread<()>> = Vec::with_capacity(thread_count);
        for thread_id in 0..thread_count {
            let operation = Arc::clone(&operation);
            let successes = Arc::clone(&successes);
            let failures = Arc::clone(&failures);
            let gate = Arc::clone(&gate);

            let worker = cancel::spawn(format!("stress-{thread_id}"), move || {
                gate.wait();
                for iteration in 0..iterations {
                    cancel::test_cancel();
                    if operation(thread_id, iteration) {
                        successes.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .expect("failed to spawn stress worker");

            workers.push(worker);
        }

        let start = Instant::now();
        for _ in 0..thread_count {
            gate.post().expect("stress gate overflow");
        }
        tracing::debug!(thread_count, iterations, "stress workers released");

        let timer = self.config.get_duration().map(|limit| {
            let targets: Vec<_> = workers.iter().map(CancellableThread::canceller).collect();
            cancel::spawn("stress-timer", move || {
                sleep::sleep(limit);
                for target in &targets {
                    target.cancel();
                }
            })
            .expect("failed to spawn stress timer")
        });

        let mut cancelled = 0;
        for worker in workers {
            match worker.join() {
                Ok(()) => {}
                Err(JoinError::Cancelled) => cancelled += 1,
                Err(JoinError::Panicked(payload)) => std::panic::resume_unwind(payload),
            }
        }
        let duration = start.elapsed();

        if let Some(timer) = timer {
            timer.cancel();
            let _ = timer.join();
        }

        if cancelled > 0 {
            tracing::debug!(cancelled, "stress workers stopped by time limit");
        }

        StressResult::new(
            successes.load(Ordering::Relaxed),
            failures.load(Ordering::Relaxed),
            cancelled,
            duration,
            thread_count,
        )
    }
}
