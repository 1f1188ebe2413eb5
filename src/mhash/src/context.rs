//! Lookup context carrying a cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{MhashError, MhashResult};

/// Cancellation signal shared by every lookup started with it.
///
/// Cancelling does not interrupt a backend call already in flight; lookups
/// notice it at their next round boundary and finish with
/// [`MhashError::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once [`cancel`](Context::cancel) has been called.
    pub fn check(&self) -> MhashResult<()> {
        if self.is_cancelled() {
            Err(MhashError::Cancelled)
        } else {
            Ok(())
        }
    }
}
