//! `Condvar` stress tests.

use crate::stress::{StressConfig, StressHarness, StressResult};
use foundation_threads::primitives::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Runs a basic `Condvar` stress test with lock/modify/signal cycles.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::{StressConfig, sync::run_condvar_stress_test};
///
/// let config = StressConfig::new().threads(10).iterations(100);
/// let result = run_condvar_stress_test(config);
///
/// assert!(result.success_rate() > 0.99);
/// ```
#[must_use]
pub fn run_condvar_stress_test(config: StressConfig) -> StressResult {
    let mutex = Arc::new(Mutex::new(0u64));
    let condvar = Arc::new(Condvar::new());

    StressHarness::new(config).run(move |_thread_id, _iteration| {
        let value = {
            let mut guard = mutex.lock();
            *guard += 1;
            *guard
        };

        // Signalling without the mutex held is allowed.
        condvar.signal();
        value > 0
    })
}

/// Runs a bounded producer-consumer stress test.
///
/// Even-numbered threads produce and the following odd-numbered thread
/// consumes, so every item produced is also consumed. With an odd thread
/// count the last thread sits out.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::{StressConfig, sync::run_condvar_producer_consumer_stress};
///
/// let config = StressConfig::new().threads(8).iterations(500);
/// let result = run_condvar_producer_consumer_stress(config);
///
/// assert!(result.success_rate() > 0.99);
/// ```
#[must_use]
pub fn run_condvar_producer_consumer_stress(config: StressConfig) -> StressResult {
    const CAPACITY: usize = 16;

    let queue = Arc::new(Mutex::new(Vec::<u64>::with_capacity(CAPACITY)));
    let not_empty = Arc::new(Condvar::new());
    let not_full = Arc::new(Condvar::new());
    let paired = config.get_thread_count() / 2 * 2;

    StressHarness::new(config).run(move |thread_id, iteration| {
        if thread_id >= paired {
            return true;
        }

        if thread_id % 2 == 0 {
            let mut guard = not_full.wait_while(queue.lock(), |items| items.len() >= CAPACITY);
            guard.push(((thread_id as u64) << 32) | iteration as u64);
            drop(guard);
            not_empty.signal();
            true
        } else {
            let mut guard = not_empty.wait_while(queue.lock(), |items| items.is_empty());
            let item = guard.pop();
            drop(guard);
            not_full.signal();
            item.is_some()
        }
    })
}

/// Runs a broadcast stress test.
///
/// Thread 0 advances a generation counter and broadcasts; every other
/// thread waits briefly for the generation to move. Waits that time out
/// still count as successes; a generation going backwards is a failure.
#[must_use]
pub fn run_condvar_broadcast_stress(config: StressConfig) -> StressResult {
    let generation = Arc::new(Mutex::new(0u64));
    let condvar = Arc::new(Condvar::new());

    StressHarness::new(config).run(move |thread_id, _iteration| {
        if thread_id == 0 {
            *generation.lock() += 1;
            condvar.broadcast();
            return true;
        }

        let guard = generation.lock();
        let seen = *guard;
        let (guard, _result) =
            condvar.wait_timeout_while(guard, Duration::from_millis(1), |current| {
                *current == seen
            });
        *guard >= seen
    })
}

/// Runs a timeout stress test.
///
/// Nobody signals, so every wait should time out.
#[must_use]
pub fn run_condvar_timeout_stress(config: StressConfig) -> StressResult {
    let mutex = Arc::new(Mutex::new(()));
    let condvar = Arc::new(Condvar::new());

    StressHarness::new(config).run(move |_thread_id, iteration| {
        let timeout = Duration::from_micros(10 + (iteration % 100) as u64);
        let (_guard, result) = condvar.wait_timeout(mutex.lock(), timeout);
        result.timed_out()
    })
}
