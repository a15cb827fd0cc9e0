//! Bounded FIFO queue built on a `Mutex` and two `Condvar`s.

use foundation_threads::primitives::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// A thread-safe bounded queue.
///
/// `push` blocks while the queue is full, `pop` while it is empty. Both
/// are cancellation points when called from a cancellable thread.
///
/// # Examples
///
/// ```
/// use foundation_testing::scenarios::ProducerConsumerQueue;
/// use std::thread;
///
/// let queue = ProducerConsumerQueue::new(2);
///
/// let producer_queue = queue.clone();
/// let producer = thread::spawn(move || {
///     for i in 0..5 {
///         producer_queue.push(i);
///     }
/// });
///
/// let received: Vec<_> = (0..5).map(|_| queue.pop()).collect();
/// producer.join().unwrap();
/// assert_eq!(received, vec![0, 1, 2, 3, 4]);
/// ```
pub struct ProducerConsumerQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> Clone for ProducerConsumerQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ProducerConsumerQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Appends an item, blocking while the queue is full.
    pub fn push(&self, item: T) {
        let capacity = self.inner.capacity;
        let mut items = self
            .inner
            .not_full
            .wait_while(self.inner.items.lock(), |items| items.len() >= capacity);
        items.push_back(item);
        drop(items);
        self.inner.not_empty.signal();
    }

    /// Removes the oldest item, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut items = self
            .inner
            .not_empty
            .wait_while(self.inner.items.lock(), |items| items.is_empty());
        let item = items.pop_front();
        drop(items);
        self.inner.not_full.signal();

        match item {
            Some(item) => item,
            None => unreachable!("woken with the queue still empty"),
        }
    }

    /// Like [`ProducerConsumerQueue::pop`], giving up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let (mut items, _result) = self.inner.not_empty.wait_timeout_while(
            self.inner.items.lock(),
            timeout,
            |items| items.is_empty(),
        );
        let item = items.pop_front();
        drop(items);
        if item.is_some() {
            self.inner.not_full.signal();
        }
        item
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}
