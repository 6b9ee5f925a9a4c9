//! Resumable HTTP transfer engine for album files.
//!
//! This module downloads one file per [`DownloadTask`], continuing from the
//! bytes already on disk when the server honours range requests, and runs
//! whole batches of tasks through a bounded worker pool.
//!
//! # Features
//!
//! - Resume from the on-disk size with a confirmed `206 Partial Content`
//! - Guard against tiny "limit exceeded" pages saved in place of real data
//! - Bounded size probing, randomized retry backoff, terminal classification
//! - Fixed-size worker pool with results in completion order
//! - Prompt, batch-wide cancellation that never deletes partial files
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use albumdl_core::download::{CancelSignal, DownloadEngine, DownloadTask};
//! use albumdl_core::TransferOptions;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::from_options(&TransferOptions::default())?;
//! let tasks = vec![DownloadTask::new("https://example.com/01-intro.mp3", "01-intro.mp3")];
//! let outcome = engine.run_batch(tasks, CancelSignal::shared()).await?;
//! println!("complete: {}, failed: {}", outcome.completed(), outcome.failed());
//! # Ok(())
//! # }
//! ```

mod cancel;
mod client;
pub mod constants;
mod engine;
mod error;
mod retry;
mod task;
mod transfer;

pub use cancel::CancelSignal;
pub use client::HttpClient;
pub use engine::{BatchOutcome, DEFAULT_CONCURRENCY, DownloadEngine, EngineError, MAX_CONCURRENCY};
pub use error::DownloadError;
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
    classify_status, fetch_with_retry,
};
pub use task::{DownloadTask, TransferResult, TransferStatus};
pub use transfer::{TransferAttemptState, TransferEngine, TransferMode};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
