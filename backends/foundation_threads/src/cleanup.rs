//! Scoped cleanup handlers.
//!
//! [`Cleanup`] runs a closure exactly once when it leaves scope, whether the
//! scope ends normally or by unwinding (including cancellation). It plays
//! the role of a push/pop cleanup pair: creating it pushes the handler,
//! [`Cleanup::run`] pops and runs it, [`Cleanup::dismiss`] pops it without
//! running.

/// Runs its closure when dropped, similar to go's defer.
#[must_use = "a cleanup handler runs when dropped; binding it to `_` runs it immediately"]
pub struct Cleanup<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Cleanup<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }

    /// Runs the handler now instead of at scope exit.
    pub fn run(mut self) {
        if let Some(cb) = self.0.take() {
            cb();
        }
    }

    /// Disarms the handler without running it.
    pub fn dismiss(mut self) {
        self.0 = None;
    }
}

impl<F: FnOnce()> Drop for Cleanup<F> {
    fn drop(&mut self) {
        if let Some(cb) = self.0.take() {
            cb();
        }
    }
}

/// Shorthand for [`Cleanup::new`].
pub fn cleanup<F: FnOnce()>(f: F) -> Cleanup<F> {
    Cleanup::new(f)
}
