//! Retry controller for whole-transfer attempts.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying attempt failures, plus [`fetch_with_retry`], which drives a
//! [`TransferEngine`] until the task reaches a terminal outcome.
//!
//! # Overview
//!
//! Each attempt ends in a [`TransferResult`] or a [`DownloadError`]. Either
//! is classified into a [`FailureType`]:
//! - [`FailureType::Retryable`] - short streams, timeouts, 5xx, limit pages
//! - [`FailureType::Terminal`] - not found, local IO, bad URLs, TLS problems
//! - [`FailureType::Cancelled`] - the batch is shutting down
//!
//! Retryable failures are attempted again after a random pause in
//! `min_delay..=max_delay` until `max_attempts` is used up. Every attempt
//! re-reads the destination, so progress made by a failed attempt is kept.
//!
//! # Example
//!
//! ```
//! use albumdl_core::download::{
//!     DownloadError, RetryPolicy, FailureType, RetryDecision, classify_error
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/01.mp3", 503);
//! let failure_type = classify_error(&error);
//!
//! match policy.should_retry(failure_type, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use super::cancel::CancelSignal;
use super::constants::DEFAULT_PROBE_ATTEMPTS;
use super::error::DownloadError;
use super::task::{DownloadTask, TransferResult, TransferStatus};
use super::transfer::{TransferEngine, bytes_on_disk};

/// Default maximum attempts per task, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lower bound of the pause between attempts.
const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(2);

/// Default upper bound of the pause between attempts.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

/// Classification of attempt failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on another attempt.
    Retryable,

    /// Will not succeed no matter how often it is attempted.
    Terminal,

    /// The batch was cancelled; stop without retrying.
    Cancelled,
}

/// Decision on whether to attempt a transfer again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt again after the specified delay.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Stop and report the task as failed.
    DoNotRetry {
        /// Human-readable reason why no further attempt is made.
        reason: String,
    },
}

/// Bounds on attempts and the pauses between them.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `probe_attempts`: 5
/// - `min_delay`: 2 seconds
/// - `max_delay`: 5 seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of whole-transfer attempts (including the first).
    max_attempts: u32,

    /// Size-probe requests allowed within one attempt.
    probe_attempts: u32,

    /// Lower bound of a pause.
    min_delay: Duration,

    /// Upper bound of a pause.
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom attempt ceiling and pause bounds.
    ///
    /// `max_attempts` is raised to at least 1; swapped bounds are reordered.
    #[must_use]
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self {
            max_attempts: max_attempts.max(1),
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            min_delay,
            max_delay,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Sets how many size probes one attempt may send (at least 1).
    #[must_use]
    pub fn with_probe_attempts(mut self, probe_attempts: u32) -> Self {
        self.probe_attempts = probe_attempts.max(1);
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the size-probe bound per attempt.
    #[must_use]
    pub fn probe_attempts(&self) -> u32 {
        self.probe_attempts
    }

    /// Lower bound of a pause.
    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Upper bound of a pause.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Determines whether to attempt again after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Terminal => {
                return RetryDecision::DoNotRetry {
                    reason: "terminal failure - retry would not help".to_string(),
                };
            }
            FailureType::Cancelled => {
                return RetryDecision::DoNotRetry {
                    reason: "batch cancelled".to_string(),
                };
            }
            FailureType::Retryable => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.backoff_delay();
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Draws a pause uniformly from `min_delay..=max_delay`.
    #[must_use]
    pub fn backoff_delay(&self) -> Duration {
        let min_ms = u64::try_from(self.min_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        if min_ms >= max_ms {
            return Duration::from_millis(min_ms);
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(min_ms..=max_ms))
    }
}

/// Classifies an attempt error into a failure type for retry decisions.
///
/// # HTTP Status Code Classification
///
/// | Status | Type |
/// |--------|------|
/// | 404, 410 | Terminal (surfaced as `NotFound`) |
/// | 408 | Retryable |
/// | 429 | Retryable |
/// | 5xx | Retryable |
/// | other | Terminal |
///
/// # Non-HTTP Errors
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Retryable |
/// | Network (most) | Retryable |
/// | Network (TLS) | Terminal |
/// | LimitPage | Retryable |
/// | NotFound | Terminal |
/// | IO | Terminal |
/// | InvalidUrl | Terminal |
/// | Cancelled | Cancelled |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { status, .. } => classify_http_status(*status),

        DownloadError::Timeout { .. }
        | DownloadError::LimitPage { .. }
        | DownloadError::SizeChanged { .. } => FailureType::Retryable,

        DownloadError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Terminal
            } else {
                FailureType::Retryable
            }
        }

        DownloadError::NotFound { .. }
        | DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. } => FailureType::Terminal,

        DownloadError::Cancelled { .. } => FailureType::Cancelled,
    }
}

/// Classifies the status of a finished attempt. `None` means the task is done.
#[must_use]
pub fn classify_status(status: TransferStatus) -> Option<FailureType> {
    match status {
        TransferStatus::Skipped | TransferStatus::Completed | TransferStatus::CompletedUnverified => {
            None
        }
        TransferStatus::Incomplete => Some(FailureType::Retryable),
        TransferStatus::Failed => Some(FailureType::Terminal),
        TransferStatus::Cancelled => Some(FailureType::Cancelled),
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 => FailureType::Retryable, // Request Timeout
        429 => FailureType::Retryable, // Too Many Requests
        status if (500..600).contains(&status) => FailureType::Retryable,
        _ => FailureType::Terminal,
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

/// Runs attempts for `task` until it completes, fails terminally, exhausts
/// `policy.max_attempts()` or `cancel` fires.
///
/// Never returns an error: every outcome, including cancellation, is a
/// [`TransferResult`] carrying the attempts spent.
#[instrument(
    skip(engine, task, policy, cancel),
    fields(url = %task.source_url(), path = %task.destination_path().display())
)]
pub async fn fetch_with_retry(
    engine: &TransferEngine,
    task: &DownloadTask,
    policy: &RetryPolicy,
    cancel: &CancelSignal,
) -> TransferResult {
    let mut attempt: u32 = 0;
    // Best size known so far: the resolver hint until a probe answers.
    let mut known_size = task.expected_size();
    loop {
        if cancel.is_cancelled() {
            return cancelled_result(task, attempt, known_size).await;
        }
        attempt += 1;
        debug!(attempt, "starting transfer attempt");

        let (failure_type, last) = match engine
            .attempt(
                task.source_url(),
                task.destination_path(),
                cancel,
                &mut known_size,
            )
            .await
        {
            Ok(result) => match classify_status(result.status()) {
                None => return result.with_attempts(attempt),
                Some(failure_type) => (failure_type, Ok(result)),
            },
            Err(error) => (classify_error(&error), Err(error)),
        };

        if failure_type == FailureType::Cancelled {
            info!(attempt, "transfer cancelled");
            return cancelled_result(task, attempt, known_size).await;
        }

        match policy.should_retry(failure_type, attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                warn!(
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %describe(&last),
                    "retrying transfer"
                );
                if cancel.guard(tokio::time::sleep(delay)).await.is_none() {
                    return cancelled_result(task, attempt, known_size).await;
                }
            }
            RetryDecision::DoNotRetry { reason } => {
                warn!(
                    attempts = attempt,
                    error = %describe(&last),
                    reason = %reason,
                    "giving up on transfer"
                );
                return give_up(task, last, attempt, known_size, &reason).await;
            }
        }
    }
}

fn describe(last: &Result<TransferResult, DownloadError>) -> String {
    match last {
        Ok(result) => result
            .reason()
            .map_or_else(|| result.status().to_string(), str::to_string),
        Err(error) => error.to_string(),
    }
}

async fn give_up(
    task: &DownloadTask,
    last: Result<TransferResult, DownloadError>,
    attempts: u32,
    known_size: Option<u64>,
    reason: &str,
) -> TransferResult {
    match last {
        Ok(result) if result.status() == TransferStatus::Failed => result.with_attempts(attempts),
        Ok(result) => {
            let message = format!(
                "{}; {reason}",
                result.reason().unwrap_or_else(|| result.status().label())
            );
            result.with_attempts(attempts).into_failed(message)
        }
        Err(error) => {
            let bytes = bytes_on_disk(task.destination_path()).await;
            TransferResult::new(
                TransferStatus::Failed,
                task.destination_path(),
                bytes,
                known_size,
            )
            .with_attempts(attempts)
            .with_reason(format!("{error}; {reason}"))
        }
    }
}

async fn cancelled_result(
    task: &DownloadTask,
    attempts: u32,
    known_size: Option<u64>,
) -> TransferResult {
    let bytes = bytes_on_disk(task.destination_path()).await;
    TransferResult::new(
        TransferStatus::Cancelled,
        task.destination_path(),
        bytes,
        known_size,
    )
    .with_attempts(attempts)
    .with_reason("batch cancelled")
}
