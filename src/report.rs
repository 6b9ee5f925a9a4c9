//! Per-file outcome reporting.
//!
//! The scheduler hands every terminal [`TransferResult`] to a [`Reporter`]
//! in completion order. Reporters only render; they never influence the
//! transfer.

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::download::{TransferResult, TransferStatus};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Width the file name is padded to in a status line.
const NAME_WIDTH: usize = 50;

/// Receives each terminal result as soon as it is known.
pub trait Reporter: Send + Sync {
    /// Called once per task, from the scheduler's collecting task.
    fn report(&self, result: &TransferResult);
}

/// Discards every result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _result: &TransferResult) {}
}

/// Human-readable explanation of an outcome.
#[must_use]
pub fn outcome_text(result: &TransferResult) -> String {
    match result.status() {
        TransferStatus::Skipped => "file already complete, skipped".to_string(),
        TransferStatus::Completed => "file downloaded and complete".to_string(),
        TransferStatus::CompletedUnverified => {
            "file downloaded, but could not verify if it is complete".to_string()
        }
        TransferStatus::Incomplete => "file download incomplete!".to_string(),
        TransferStatus::Failed => format!(
            "download failed: {}",
            result.reason().unwrap_or("unknown error")
        ),
        TransferStatus::Cancelled => "download cancelled".to_string(),
    }
}

/// Renders the one-line summary of a result.
///
/// ```text
/// 01-intro.mp3                                              05.19 of 05.19 MB [100%] (file downloaded and complete)
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn status_line(result: &TransferResult) -> String {
    let done = result.bytes_transferred();
    let (total, percent) = match result.expected_size() {
        Some(expected) => {
            let percent = if expected == 0 {
                100
            } else {
                u128::from(done) * 100 / u128::from(expected)
            };
            (
                format!("{:05.2}", expected as f64 / BYTES_PER_MB),
                percent.to_string(),
            )
        }
        None => ("unknown".to_string(), "?".to_string()),
    };
    format!(
        "{:<width$}        {:05.2} of {total} MB [{percent:>3}%] ({})",
        result.file_name(),
        done as f64 / BYTES_PER_MB,
        outcome_text(result),
        width = NAME_WIDTH,
    )
}

/// Writes one [`status_line`] per result.
#[derive(Debug)]
pub struct LineReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> LineReporter<W> {
    /// Creates a reporter writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer, e.g. to inspect captured output.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Reporter for LineReporter<W> {
    fn report(&self, result: &TransferResult) {
        let line = status_line(result);
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            debug!(error = %e, "failed to write status line");
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    file: String,
    outcome: String,
    #[serde(flatten)]
    result: &'a TransferResult,
}

/// Writes one JSON object per result, one per line.
#[derive(Debug)]
pub struct JsonReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonReporter<W> {
    /// Creates a reporter writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn report(&self, result: &TransferResult) {
        let line = JsonLine {
            file: result.file_name(),
            outcome: outcome_text(result),
            result,
        };
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let written = serde_json::to_writer(&mut *out, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(out))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            debug!(error = %e, "failed to write JSON line");
        }
    }
}
