// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interrupt latch shared between a handle and its blocking reads.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Notify;

/// Interrupt latch for a process handle.
///
/// Cloneable and backed by an `Arc`; the first `destroy()` (or an external
/// interruption) trips it, and every blocking bootstrap read consults it to
/// abort early with an interruption-flavoured failure instead of hanging.
#[derive(Clone, Debug)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    /// Create a new, untripped token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Trip the latch and wake all waiters.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// `true` once the latch has been tripped.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the latch trips (returns immediately if it already has).
    pub async fn cancelled(&self) {
        let mut notified = std::pin::pin!(self.notify.notified());
        // Register before re-checking the flag, so a cancel() landing
        // between the check and the await cannot be missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
