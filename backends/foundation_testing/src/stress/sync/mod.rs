//! Stress tests for synchronization primitives.

pub mod condvar;
pub mod rwlock;
pub mod semaphore;

pub use condvar::{
    run_condvar_broadcast_stress, run_condvar_producer_consumer_stress, run_condvar_stress_test,
    run_condvar_timeout_stress,
};
pub use rwlock::{run_rwlock_recursive_read_stress, run_rwlock_stress_test};
pub use semaphore::{run_semaphore_stress_test, run_semaphore_try_wait_stress};
