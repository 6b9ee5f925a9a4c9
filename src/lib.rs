//! Albumdl Core Library
//!
//! This library provides the transfer core of the `albumdl` tool, which
//! retrieves the files of an album (covers, audio tracks) to local disk,
//! resuming interrupted transfers and running several downloads at once.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Immutable run configuration (concurrency, timeout, proxy)
//! - [`download`] - Resumable transfer engine, retry controller and scheduler
//! - [`report`] - Per-file status lines for finished transfers
//! - [`resolver`] - Turning caller input into a batch of download tasks

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod report;
pub mod resolver;

// Re-export commonly used types
pub use config::{ConfigError, SocksProxy, TransferOptions, Verbosity};
pub use download::{
    BatchOutcome, CancelSignal, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DownloadEngine,
    DownloadError, DownloadTask, EngineError, FailureType, HttpClient, RetryDecision, RetryPolicy,
    TransferEngine, TransferResult, TransferStatus, classify_error, fetch_with_retry,
};
pub use report::{JsonReporter, LineReporter, NoopReporter, Reporter, status_line};
pub use resolver::{ManifestResolver, ResolveError, ResolvedFile, Resolver, build_batch};
