//! Batch scheduler: a fixed pool of workers draining a queue of tasks.
//!
//! This module provides the `DownloadEngine`, which runs a batch of
//! [`DownloadTask`]s through at most `concurrency` simultaneous transfers,
//! each driven by the retry controller, and gathers the outcomes in
//! completion order.
//!
//! # Overview
//!
//! All tasks are placed on a work queue up front. `min(concurrency, tasks)`
//! workers pull from it; a worker that finishes one task immediately takes
//! the next. Results flow back over a channel and are handed to the
//! [`Reporter`] as they arrive.
//!
//! Tripping the [`CancelSignal`] stops workers from taking new tasks and
//! aborts in-flight network waits. Tasks left on the queue are counted as
//! not started; partial files stay on disk.
//!
//! # Example
//!
//! ```no_run
//! use albumdl_core::download::{CancelSignal, DownloadEngine, DownloadTask};
//! use albumdl_core::TransferOptions;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::from_options(&TransferOptions::default())?;
//! let tasks = vec![DownloadTask::new("https://example.com/01.mp3", "./01.mp3")];
//! let outcome = engine.run_batch(tasks, CancelSignal::shared()).await?;
//! println!("Completed: {}, Failed: {}, Retried: {}", outcome.completed(), outcome.failed(), outcome.retried());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, warn};

use super::cancel::CancelSignal;
use super::client::HttpClient;
use super::retry::{RetryPolicy, fetch_with_retry};
use super::task::{DownloadTask, TransferResult, TransferStatus};
use super::transfer::TransferEngine;
use crate::config::TransferOptions;
use crate::report::{NoopReporter, Reporter};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// Default concurrency. Small because the remote hosts throttle aggressive parallelism.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Error type for scheduler operations.
///
/// These reject a batch before any network activity; once workers start,
/// every problem ends up in a [`TransferResult`] instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Two tasks in the batch write to the same file.
    #[error("duplicate destination in batch: {}", path.display())]
    DuplicateDestination {
        /// The path claimed more than once.
        path: PathBuf,
    },

    /// The HTTP client could not be built from the options.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Outcome of one `run_batch` call.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    results: Vec<TransferResult>,
    total: usize,
    cancelled: bool,
}

impl BatchOutcome {
    /// Settles the outcome once every worker has stopped.
    ///
    /// The batch counts as cancelled only when the signal cut something
    /// short; a signal arriving after the last task finished changes nothing.
    fn settle(results: Vec<TransferResult>, total: usize, signal_tripped: bool) -> Self {
        let interrupted = results.len() < total
            || results
                .iter()
                .any(|r| r.status() == TransferStatus::Cancelled);
        Self {
            results,
            total,
            cancelled: signal_tripped && interrupted,
        }
    }

    /// Results in completion order.
    #[must_use]
    pub fn results(&self) -> &[TransferResult] {
        &self.results
    }

    /// Consumes the outcome, returning the results in completion order.
    #[must_use]
    pub fn into_results(self) -> Vec<TransferResult> {
        self.results
    }

    /// Number of tasks submitted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Tasks whose bytes were fetched (verified or not).
    #[must_use]
    pub fn completed(&self) -> usize {
        self.count(|s| {
            matches!(
                s,
                TransferStatus::Completed | TransferStatus::CompletedUnverified
            )
        })
    }

    /// Tasks that were already complete on disk.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| s == TransferStatus::Skipped)
    }

    /// Tasks that gave up.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TransferStatus::Failed | TransferStatus::Incomplete))
    }

    /// Tasks interrupted by cancellation while in flight.
    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.count(|s| s == TransferStatus::Cancelled)
    }

    /// Tasks never dispatched to a worker.
    #[must_use]
    pub fn not_started(&self) -> usize {
        self.total.saturating_sub(self.results.len())
    }

    /// Extra attempts spent across the batch.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.results
            .iter()
            .map(|r| r.attempts().saturating_sub(1) as usize)
            .sum()
    }

    /// Whether the batch was cancelled.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True when nothing was cancelled or left unstarted and every task succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self.not_started() == 0
            && self.results.iter().all(|r| r.status().is_success())
    }

    fn count(&self, predicate: impl Fn(TransferStatus) -> bool) -> usize {
        self.results
            .iter()
            .filter(|r| predicate(r.status()))
            .count()
    }
}

/// Batch scheduler with a bounded worker pool.
///
/// # Concurrency Model
///
/// - Each worker runs in its own Tokio task
/// - Workers take owned tasks from a shared queue, one at a time
/// - At most `concurrency` transfers are in flight at any moment
/// - Each task owns a distinct destination, so file writes need no locking
///
/// # Retry Behavior
///
/// - Short streams, timeouts and 5xx are retried after a random 2-5 s pause
/// - Not-found, local IO errors and bad URLs fail immediately
/// - Attempts resume from whatever the previous attempt left on disk
#[derive(Debug)]
pub struct DownloadEngine {
    /// Single-attempt transfer engine shared by all workers.
    transfer: TransferEngine,
    /// Configured concurrency limit.
    concurrency: usize,
    /// Retry policy for failed attempts.
    retry_policy: RetryPolicy,
}

impl DownloadEngine {
    /// Creates a scheduler with the given concurrency limit, retry policy and client.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-32).
    ///
    /// # Example
    ///
    /// ```
    /// use albumdl_core::download::{DownloadEngine, HttpClient, RetryPolicy};
    ///
    /// let engine = DownloadEngine::new(3, RetryPolicy::default(), HttpClient::new()).unwrap();
    /// assert_eq!(engine.concurrency(), 3);
    /// ```
    #[instrument(level = "debug", skip(retry_policy, client))]
    pub fn new(
        concurrency: usize,
        retry_policy: RetryPolicy,
        client: HttpClient,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            probe_attempts = retry_policy.probe_attempts(),
            "creating download engine"
        );

        Ok(Self {
            transfer: TransferEngine::new(client, retry_policy.clone()),
            concurrency,
            retry_policy,
        })
    }

    /// Creates a scheduler, and its HTTP client, from run options.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ClientBuild`] if the client cannot be built and
    /// [`EngineError::InvalidConcurrency`] for an out-of-range worker count.
    pub fn from_options(options: &TransferOptions) -> Result<Self, EngineError> {
        let client = HttpClient::from_options(options).map_err(EngineError::ClientBuild)?;
        Self::new(
            options.concurrency_limit(),
            options.retry_policy().clone(),
            client,
        )
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Runs `tasks` to completion or cancellation without reporting.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateDestination`] if two tasks share a
    /// destination path. Individual transfer failures do NOT cause this
    /// method to error.
    pub async fn run_batch(
        &self,
        tasks: Vec<DownloadTask>,
        cancel: Arc<CancelSignal>,
    ) -> Result<BatchOutcome, EngineError> {
        self.run_batch_with_reporter(tasks, cancel, &NoopReporter)
            .await
    }

    /// Runs `tasks`, handing every result to `reporter` as it arrives.
    ///
    /// Blocks until every dispatched task has a terminal result. After
    /// `cancel` fires, no further task is dispatched and in-flight workers
    /// stop at their next network wait.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateDestination`] if two tasks share a
    /// destination path. The check happens before any network activity.
    #[instrument(skip(self, tasks, cancel, reporter), fields(tasks = tasks.len(), concurrency = self.concurrency))]
    pub async fn run_batch_with_reporter(
        &self,
        tasks: Vec<DownloadTask>,
        cancel: Arc<CancelSignal>,
        reporter: &dyn Reporter,
    ) -> Result<BatchOutcome, EngineError> {
        ensure_unique_destinations(&tasks)?;

        let total = tasks.len();
        if total == 0 {
            debug!("empty batch, nothing to do");
            return Ok(BatchOutcome::default());
        }

        let (queue_tx, queue_rx) = mpsc::channel(total);
        for task in tasks {
            // Capacity equals the task count and the receiver is alive.
            if queue_tx.try_send(task).is_err() {
                warn!("work queue rejected a task");
            }
        }
        drop(queue_tx);
        let queue = Arc::new(Mutex::new(queue_rx));

        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let workers = self.concurrency.min(total);
        info!(workers, total, "starting batch");

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let results_tx = results_tx.clone();
                let cancel = Arc::clone(&cancel);
                let transfer = self.transfer.clone();
                let policy = self.retry_policy.clone();
                tokio::spawn(async move {
                    loop {
                        if cancel.is_cancelled() {
                            debug!(worker_id, "cancelled, taking no more tasks");
                            break;
                        }
                        // Filled before the workers start; empty means drained.
                        let next = queue.lock().await.try_recv();
                        let Ok(task) = next else {
                            break;
                        };
                        let result = fetch_with_retry(&transfer, &task, &policy, &cancel).await;
                        if results_tx.send(result).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(results_tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = results_rx.recv().await {
            reporter.report(&result);
            results.push(result);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "transfer worker panicked");
            }
        }

        let outcome = BatchOutcome::settle(results, total, cancel.is_cancelled());
        info!(
            completed = outcome.completed(),
            skipped = outcome.skipped(),
            failed = outcome.failed(),
            cancelled = outcome.cancelled_count(),
            not_started = outcome.not_started(),
            retried = outcome.retried(),
            "batch finished"
        );
        Ok(outcome)
    }
}

fn ensure_unique_destinations(tasks: &[DownloadTask]) -> Result<(), EngineError> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen.insert(task.destination_path()) {
            return Err(EngineError::DuplicateDestination {
                path: task.destination_path().to_path_buf(),
            });
        }
    }
    Ok(())
}
