//! Sleeping that doubles as a cancellation point.
//!
//! Unlike [`std::thread::sleep`], a cancellable thread sleeping here wakes
//! as soon as it is cancelled and unwinds instead of finishing the sleep.

use core::sync::atomic::Ordering;
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use crate::cancel;
use crate::cleanup::Cleanup;
use crate::primitives::wait_cell::deadline_after;
use crate::primitives::WaitCell;

/// Sleeps until `deadline`.
pub fn sleep_until(deadline: Instant) {
    park_until(Some(deadline));
}

/// Sleeps for `duration`.
///
/// A duration too large to express as a deadline sleeps until cancelled.
pub fn sleep(duration: Duration) {
    park_until(deadline_after(duration));
}

fn park_until(deadline: Option<Instant>) {
    let cell = Arc::new(WaitCell::new(0));
    cancel::set_cancel_address(&cell);
    let _registered = Cleanup::new(|| cancel::clear_cancel_address(&cell));

    cancel::test_cancel();

    let mut seen = 0;
    loop {
        if cell.wait_deadline(seen, deadline).timed_out() {
            return;
        }
        // Masked requests keep the cell bumped; waiting on the new value
        // avoids spinning until the deadline.
        seen = cell.load(Ordering::Acquire);
        cancel::test_cancel();
    }
}
