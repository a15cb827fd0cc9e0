//! Reader-writer lock exclusion and semaphore accounting under real
//! thread contention.

use foundation_threads::cancel;
use foundation_threads::primitives::{RawRwLock, RwLock, RwLockState, Semaphore};
use foundation_threads::SemaphoreError;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// `WHY`: A writer must be alone inside the lock
/// `WHAT`: Readers never observe a writer inside, writers never overlap
#[test]
#[serial]
#[ntest::timeout(20000)]
fn test_rwlock_exclusion() {
    let lock = Arc::new(RawRwLock::new());
    let writer_inside = Arc::new(AtomicBool::new(false));
    let readers_inside = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|id| {
            let lock = Arc::clone(&lock);
            let writer_inside = Arc::clone(&writer_inside);
            let readers_inside = Arc::clone(&readers_inside);
            let violations = Arc::clone(&violations);

            thread::spawn(move || {
                for _ in 0..300 {
                    if id % 3 == 0 {
                        lock.wrlock();
                        if writer_inside.swap(true, Ordering::SeqCst)
                            || readers_inside.load(Ordering::SeqCst) != 0
                        {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::yield_now();
                        writer_inside.store(false, Ordering::SeqCst);
                        lock.unlock();
                    } else {
                        lock.rdlock();
                        readers_inside.fetch_add(1, Ordering::SeqCst);
                        if writer_inside.load(Ordering::SeqCst) {
                            violations.fetch_add(1, Ordering::SeqCst);
                        }
                        readers_inside.fetch_sub(1, Ordering::SeqCst);
                        lock.unlock();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(lock.state(), RwLockState::Unheld);
}

/// `WHY`: Readers may re-enter even with a writer queued
/// `WHAT`: A second read lock succeeds while a writer waits, and the
/// writer proceeds once both are released
#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_recursive_read_with_waiting_writer() {
    let lock = Arc::new(RwLock::new(0));
    let outer = lock.read();

    let (tx, rx) = mpsc::channel();
    let writer_lock = Arc::clone(&lock);
    let writer = thread::spawn(move || {
        *writer_lock.write() = 1;
        tx.send(()).unwrap();
    });

    thread::sleep(Duration::from_millis(20));
    let inner = lock.read();
    assert_eq!(lock.state(), RwLockState::Read(2));
    assert!(rx.try_recv().is_err());

    drop(inner);
    drop(outer);
    rx.recv().unwrap();
    writer.join().unwrap();
    assert_eq!(*lock.read(), 1);
}

fn wait_for_waiters(lock: &RawRwLock, count: usize) {
    while lock.waiters() < count {
        thread::yield_now();
    }
}

/// `WHY`: A writer blocked in `wrlock` is at a cancellation point, and
/// cancelling it around the last reader's release must not strand the
/// writers behind it
/// `WHAT`: The cancelled writer unwinds and the next writer gets the lock
#[test]
#[serial]
#[ntest::timeout(20000)]
fn test_cancel_writer_blocked_in_wrlock() {
    for _ in 0..50 {
        let lock = Arc::new(RawRwLock::new());
        lock.rdlock();

        let first_lock = Arc::clone(&lock);
        let first = cancel::spawn("cancelled-writer", move || {
            first_lock.wrlock();
            first_lock.unlock();
        })
        .unwrap();
        wait_for_waiters(&lock, 1);

        let (tx, rx) = mpsc::channel();
        let second_lock = Arc::clone(&lock);
        let second = thread::spawn(move || {
            second_lock.wrlock();
            tx.send(()).unwrap();
            second_lock.unlock();
        });
        wait_for_waiters(&lock, 2);

        lock.unlock();
        first.cancel();

        // The first writer may win the lock before the request lands.
        let _ = first.join();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("second writer never acquired the lock");
        second.join().unwrap();
        assert_eq!(lock.state(), RwLockState::Unheld);
        assert_eq!(lock.waiters(), 0);
    }
}

/// `WHY`: A reader blocked in `rdlock` is at a cancellation point
/// `WHAT`: Cancelling it leaves the queue clean and the other reader still
/// gets in when the writer releases
#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_cancel_reader_blocked_in_rdlock() {
    let lock = Arc::new(RawRwLock::new());
    lock.wrlock();

    let first_lock = Arc::clone(&lock);
    let first = cancel::spawn("cancelled-reader", move || {
        first_lock.rdlock();
        first_lock.unlock();
    })
    .unwrap();
    wait_for_waiters(&lock, 1);

    let (tx, rx) = mpsc::channel();
    let second_lock = Arc::clone(&lock);
    let second = thread::spawn(move || {
        second_lock.rdlock();
        tx.send(second_lock.state()).unwrap();
        second_lock.unlock();
    });
    wait_for_waiters(&lock, 2);

    first.cancel();
    assert!(first.join().unwrap_err().is_cancelled());
    assert_eq!(lock.waiters(), 1);
    assert_eq!(lock.state(), RwLockState::Write);

    lock.unlock();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        RwLockState::Read(1)
    );
    second.join().unwrap();
    assert_eq!(lock.state(), RwLockState::Unheld);
}

/// `WHY`: Every post is consumed by exactly one wait
/// `WHAT`: Balanced producers and consumers leave the count unchanged
#[test]
#[serial]
#[ntest::timeout(20000)]
fn test_semaphore_conservation() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 500;

    let sem = Arc::new(Semaphore::new(2));

    let consumers: Vec<_> = (0..THREADS)
        .map(|_| {
            let sem = Arc::clone(&sem);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    sem.wait();
                }
            })
        })
        .collect();

    let producers: Vec<_> = (0..THREADS)
        .map(|_| {
            let sem = Arc::clone(&sem);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    sem.post().unwrap();
                }
            })
        })
        .collect();

    for handle in producers.into_iter().chain(consumers) {
        handle.join().unwrap();
    }
    assert_eq!(sem.value(), 2);
}

#[test]
fn test_semaphore_overflow_leaves_count() {
    let sem = Semaphore::new(u32::MAX - 1);
    sem.post().unwrap();
    assert_eq!(sem.post(), Err(SemaphoreError::Overflow));
    assert_eq!(sem.value(), u32::MAX);

    assert!(sem.try_wait());
    assert_eq!(sem.value(), u32::MAX - 1);
}

/// `WHY`: A timed wait must still take a unit that arrives in time
/// `WHAT`: A post before the deadline completes the wait
#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_semaphore_wait_timeout_receives_post() {
    let sem = Arc::new(Semaphore::new(0));
    let poster = Arc::clone(&sem);

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        poster.post().unwrap();
    });

    let result = sem.wait_timeout(Duration::from_secs(5));
    assert!(!result.timed_out());
    assert_eq!(sem.value(), 0);
    handle.join().unwrap();
}
