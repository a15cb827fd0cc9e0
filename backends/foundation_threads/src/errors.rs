use core::any::Any;

use derive_more::From;

pub type SemaphoreResult<T> = std::result::Result<T, SemaphoreError>;

/// Recoverable semaphore failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreError {
    /// `post` found the count already at `u32::MAX`; the count is unchanged.
    Overflow,
}

impl std::error::Error for SemaphoreError {}

impl core::fmt::Display for SemaphoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow => write!(f, "semaphore count is already at its maximum"),
        }
    }
}

pub type PanicPayload = Box<dyn Any + Send + 'static>;

pub type JoinResult<T> = std::result::Result<T, JoinError>;

/// Why a cancellable thread did not produce a value.
#[derive(From, Debug)]
pub enum JoinError {
    /// The thread acted on a cancellation request.
    #[from(ignore)]
    Cancelled,

    /// The thread panicked; the payload is preserved.
    Panicked(PanicPayload),
}

impl JoinError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl std::error::Error for JoinError {}

impl core::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "thread was cancelled"),
            Self::Panicked(_) => write!(f, "thread panicked"),
        }
    }
}
