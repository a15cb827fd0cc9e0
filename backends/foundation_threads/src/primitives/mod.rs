//! Blocking synchronization primitives for native threads.

// Public modules
pub mod condvar;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;
pub mod wait_cell;

pub(crate) mod wait_queue;

// Re-export the parking word
pub use wait_cell::{WaitCell, WaitTimeoutResult};

// Re-export mutex types
pub use mutex::{Mutex, MutexGuard};

// Re-export condvar types
pub use condvar::Condvar;

// Re-export rwlock types
pub use rwlock::{RawRwLock, RwLock, RwLockReadGuard, RwLockState, RwLockWriteGuard};

pub use semaphore::Semaphore;
