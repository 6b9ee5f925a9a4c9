//! Batch-wide cancellation.
//!
//! A [`CancelSignal`] is shared by the scheduler and every worker. Tripping
//! it stops new tasks from being dispatched and wakes every network wait
//! that is racing against [`CancelSignal::cancelled`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Cancellation flag observable by all workers of a batch.
#[derive(Debug, Default)]
pub struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// Creates a signal that has not been tripped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new signal wrapped in [`Arc`] for sharing with workers.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Requests cancellation. Wakes all current waiters exactly once.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation is requested. Returns immediately if it already was.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent `cancel()` cannot slip between.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Runs `operation` unless cancellation wins the race first.
    ///
    /// Returns `None` when cancelled; the operation future is dropped, which
    /// aborts any in-flight request it owned.
    pub async fn guard<F: Future>(&self, operation: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            output = operation => Some(output),
        }
    }
}
