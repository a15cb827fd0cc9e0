//! Common synchronization patterns built on `foundation_threads`.
//!
//! Provides reusable implementations of classic concurrency patterns:
//! - Bounded producer-consumer queues
//! - Generation-counting barriers

pub mod barrier;
pub mod producer_consumer;

pub use barrier::Barrier;
pub use producer_consumer::ProducerConsumerQueue;
