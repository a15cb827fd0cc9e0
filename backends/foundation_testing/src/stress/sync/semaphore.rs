//! `Semaphore` stress tests.

use crate::stress::{StressConfig, StressHarness, StressResult};
use foundation_threads::primitives::Semaphore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Runs a bounded-concurrency stress test.
///
/// Threads repeatedly take one of `permits` units, record how many
/// holders are inside, and give the unit back. An operation fails if more
/// than `permits` holders were ever inside at once or a post overflowed.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::{StressConfig, sync::run_semaphore_stress_test};
///
/// let result = run_semaphore_stress_test(StressConfig::new().threads(8).iterations(200), 3);
/// assert_eq!(result.failures, 0);
/// ```
#[must_use]
pub fn run_semaphore_stress_test(config: StressConfig, permits: u32) -> StressResult {
    let semaphore = Arc::new(Semaphore::new(permits));
    let inside = Arc::new(AtomicU32::new(0));

    StressHarness::new(config).run(move |_thread_id, _iteration| {
        semaphore.wait();
        let holders = inside.fetch_add(1, Ordering::AcqRel) + 1;
        std::thread::yield_now();
        inside.fetch_sub(1, Ordering::AcqRel);

        semaphore.post().is_ok() && holders <= permits
    })
}

/// Runs a mixed blocking/non-blocking stress test.
///
/// Odd iterations use `try_wait`, even ones a blocking `wait`. Failed
/// `try_wait` calls count as failures, so only the final count is a
/// correctness signal; use [`run_semaphore_stress_test`] for the bound.
#[must_use]
pub fn run_semaphore_try_wait_stress(config: StressConfig, permits: u32) -> StressResult {
    let semaphore = Arc::new(Semaphore::new(permits));

    StressHarness::new(config).run(move |_thread_id, iteration| {
        let acquired = if iteration % 2 == 1 {
            semaphore.try_wait()
        } else {
            semaphore.wait();
            true
        };

        if acquired {
            semaphore.post().is_ok()
        } else {
            false
        }
    })
}
