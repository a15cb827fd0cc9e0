//! `RwLock` stress tests.

use crate::stress::{StressConfig, StressHarness, StressResult};
use foundation_threads::primitives::RwLock;
use std::sync::Arc;

/// Runs a reader/writer consistency stress test.
///
/// Every fourth thread writes, bumping both halves of a pair under the
/// write lock. Readers succeed only if they never see the halves differ,
/// which would mean a reader overlapped a writer.
///
/// # Examples
///
/// ```
/// use foundation_testing::stress::{StressConfig, sync::run_rwlock_stress_test};
///
/// let result = run_rwlock_stress_test(StressConfig::new().threads(8).iterations(200));
/// assert_eq!(result.failures, 0);
/// ```
#[must_use]
pub fn run_rwlock_stress_test(config: StressConfig) -> StressResult {
    let pair = Arc::new(RwLock::new((0u64, 0u64)));

    StressHarness::new(config).run(move |thread_id, _iteration| {
        if thread_id % 4 == 0 {
            let mut guard = pair.write();
            guard.0 += 1;
            std::hint::spin_loop();
            guard.1 += 1;
            true
        } else {
            let guard = pair.read();
            guard.0 == guard.1
        }
    })
}

/// Runs a recursive read stress test.
///
/// Readers take a second read lock while holding the first, racing a
/// writer. Recursive reads must never deadlock against the writer.
#[must_use]
pub fn run_rwlock_recursive_read_stress(config: StressConfig) -> StressResult {
    let value = Arc::new(RwLock::new(0u64));

    StressHarness::new(config).run(move |thread_id, _iteration| {
        if thread_id == 0 {
            *value.write() += 1;
            return true;
        }

        let outer = value.read();
        let inner = value.read();
        *outer == *inner
    })
}
