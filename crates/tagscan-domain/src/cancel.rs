use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

/// Raised when evaluation observes a tripped [`CancelToken`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("evaluation cancelled")]
pub struct Cancelled;

/// Cooperative cancellation, polled between pattern attempts.
///
/// Cloning is cheap and all clones share the flag. A token trips either
/// explicitly via [`cancel`](CancelToken::cancel) or implicitly once its
/// deadline passes. Work in flight is expected to poll
/// [`check`](CancelToken::check) and unwind with [`Cancelled`]; partial
/// results from a cancelled unit of work are discarded by the caller.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline,
        }
    }

    /// A token that never trips on its own.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Derive a token sharing this token's flag but with its own, possibly
    /// earlier, deadline.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(outer) => Some(outer.min(deadline)),
            None => Some(deadline),
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
