//! Portable threading primitives for native targets.
//!
//! This crate provides:
//! - **Condition variables** with FIFO signalling and targeted wakes
//! - **Reader-writer locks** layered on a mutex and condition variable
//! - **Counting semaphores** with lock-free post/wait
//! - **Cooperative cancellation** delivered at blocking points
//! - **Lock marks**: a debug-build record of the locks each thread holds
//! - **Global locks**: a fixed set of named process-wide mutexes
//!
//! Every blocking primitive parks on a [`WaitCell`](primitives::WaitCell),
//! a futex-like word backed by `parking_lot_core`.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use foundation_threads::cancel;
//! use foundation_threads::primitives::{Condvar, Mutex};
//!
//! let pair = Arc::new((Mutex::new(false), Condvar::new()));
//! let worker_pair = Arc::clone(&pair);
//!
//! let worker = cancel::spawn("waiter", move || {
//!     let (lock, cvar) = &*worker_pair;
//!     let _ready = cvar.wait_while(lock.lock(), |ready| !*ready);
//! })
//! .unwrap();
//!
//! // Cancellation unwinds the waiter out of `wait_while`.
//! worker.cancel();
//! assert!(worker.join().unwrap_err().is_cancelled());
//! assert_eq!(pair.1.waiters(), 0);
//! ```
//!
//! # Features
//!
//! - `lock_marks`: keep the lock tracker on in release builds

#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod cleanup;
pub mod errors;
pub mod global;
pub mod lockmark;
pub mod primitives;
pub mod sleep;

// Re-export commonly used items
pub use cancel::{spawn, test_cancel, CancellableThread};
pub use errors::{JoinError, SemaphoreError};
pub use global::{global_lock, GlobalLock};
pub use primitives::{Condvar, Mutex, MutexGuard, RwLock, Semaphore, WaitTimeoutResult};
