//! Cancellation of sleeping and masked threads, plus the process-wide
//! named locks.

use foundation_threads::cancel;
use foundation_threads::global::{global_lock, GlobalLock};
use foundation_threads::lockmark;
use foundation_threads::sleep;
use foundation_threads::JoinError;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_test::traced_test;

/// `WHY`: Sleeping threads must be cancellable promptly
/// `WHAT`: A minute-long sleep ends as soon as the thread is cancelled
#[traced_test]
#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_cancel_interrupts_long_sleep() {
    let worker = cancel::spawn("long-sleeper", || {
        sleep::sleep(Duration::from_secs(60));
    })
    .unwrap();

    thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    worker.cancel();

    assert!(matches!(worker.join(), Err(JoinError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(logs_contain("cancellation requested"));
}

/// `WHY`: Masked sleeps must run to completion
/// `WHAT`: The request is held until the mask drops, then delivered
#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_masked_sleep_completes_then_cancels() {
    let (tx, rx) = mpsc::channel();

    let worker = cancel::spawn("masked-sleeper", move || {
        let mask = cancel::mask_cancellation();
        let start = Instant::now();
        sleep::sleep(Duration::from_millis(60));
        tx.send(start.elapsed()).unwrap();
        drop(mask);
        cancel::test_cancel();
    })
    .unwrap();

    thread::sleep(Duration::from_millis(10));
    worker.cancel();

    let slept = rx.recv().unwrap();
    assert!(slept >= Duration::from_millis(50));
    assert!(worker.join().unwrap_err().is_cancelled());
}

/// `WHY`: A request made before the thread blocks must not be lost
/// `WHAT`: Sleeping after a pending request unwinds immediately
#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_pending_request_delivered_at_sleep() {
    let (go_tx, go_rx) = mpsc::channel::<()>();

    let worker = cancel::spawn("late-sleeper", move || {
        go_rx.recv().unwrap();
        assert!(cancel::is_cancelled());
        sleep::sleep(Duration::from_secs(60));
    })
    .unwrap();

    worker.cancel();
    go_tx.send(()).unwrap();
    assert!(worker.join().unwrap_err().is_cancelled());
}

#[test]
fn test_sleep_on_plain_thread_is_not_cancellable() {
    assert!(!cancel::is_cancelled());
    let start = Instant::now();
    sleep::sleep(Duration::from_millis(15));
    assert!(start.elapsed() >= Duration::from_millis(15));
}

/// `WHY`: A named global lock serialises its users
/// `WHAT`: A second thread blocks on the same lock but not on another one
#[test]
#[serial]
#[ntest::timeout(10000)]
fn test_global_locks_exclude_per_index() {
    let held = global_lock(GlobalLock::Compositor);
    let acquired = Arc::new(AtomicBool::new(false));

    let contender_flag = Arc::clone(&acquired);
    let contender = thread::spawn(move || {
        let _other = GlobalLock::Display.lock();
        let _same = GlobalLock::Compositor.lock();
        contender_flag.store(true, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(30));
    assert!(!acquired.load(Ordering::SeqCst));

    drop(held);
    contender.join().unwrap();
    assert!(acquired.load(Ordering::SeqCst));
}

/// `WHY`: Lock marks count nested holds
/// `WHAT`: A lock marked twice stays marked until unmarked twice
#[cfg(debug_assertions)]
#[test]
fn test_lock_marks_nest() {
    let resource = String::from("device");

    lockmark::mark(&resource);
    lockmark::mark(&resource);
    lockmark::unmark(&resource);
    assert!(lockmark::marked(&resource));

    lockmark::unmark(&resource);
    assert!(!lockmark::marked(&resource));
}

#[test]
fn test_guard_marks_mutex_as_held() {
    let guard = GlobalLock::Crypto.lock();
    lockmark::assert_held(guard.mutex());
}
