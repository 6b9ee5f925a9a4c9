//! Units of work and their outcomes.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// One file to fetch: where it comes from and exactly where it goes.
///
/// Tasks are immutable once created and are moved, by value, into the
/// worker that executes them. Destination paths must be unique within a
/// batch; the scheduler refuses a batch that breaks this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    source_url: String,
    destination_path: PathBuf,
    expected_size: Option<u64>,
}

impl DownloadTask {
    /// Creates a task whose size is unknown until probed.
    #[must_use]
    pub fn new(source_url: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
            expected_size: None,
        }
    }

    /// Attaches a size hint supplied by the resolver.
    #[must_use]
    pub fn with_expected_size(mut self, expected_size: u64) -> Self {
        self.expected_size = Some(expected_size);
        self
    }

    /// URL the bytes are fetched from.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Path the bytes are written to.
    #[must_use]
    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    /// Size hint, if the resolver knew one.
    #[must_use]
    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }
}

/// Outcome category of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// The destination already held the complete file.
    Skipped,
    /// Bytes on disk equal the size the server announced.
    Completed,
    /// The server never announced a size; whatever arrived is final.
    CompletedUnverified,
    /// The body ended short of the announced size. Partial data is kept.
    Incomplete,
    /// Gave up: terminal error, attempt ceiling, or more bytes than announced.
    Failed,
    /// The batch was cancelled while this task was in flight.
    Cancelled,
}

impl TransferStatus {
    /// Whether this outcome counts as a successful end state for the batch.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Completed | Self::CompletedUnverified
        )
    }

    /// Short lowercase label used in logs and machine output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Completed => "complete",
            Self::CompletedUnverified => "complete-unverified",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What happened to one task, as handed to the reporter and the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    status: TransferStatus,
    bytes_transferred: u64,
    expected_size: Option<u64>,
    destination_path: PathBuf,
    attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl TransferResult {
    /// Creates a result for a single attempt.
    #[must_use]
    pub fn new(
        status: TransferStatus,
        destination_path: impl Into<PathBuf>,
        bytes_transferred: u64,
        expected_size: Option<u64>,
    ) -> Self {
        Self {
            status,
            bytes_transferred,
            expected_size,
            destination_path: destination_path.into(),
            attempts: 1,
            reason: None,
        }
    }

    /// Records how many attempts the retry controller spent on the task.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Attaches a human-readable explanation.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Converts an intermediate result into a terminal failure, keeping the byte counts.
    #[must_use]
    pub fn into_failed(mut self, reason: impl Into<String>) -> Self {
        self.status = TransferStatus::Failed;
        self.reason = Some(reason.into());
        self
    }

    /// Outcome category.
    #[must_use]
    pub fn status(&self) -> TransferStatus {
        self.status
    }

    /// Bytes present at the destination when the attempt ended.
    #[must_use]
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Size announced by the server; `None` when it could not be determined.
    #[must_use]
    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    /// Destination the bytes were written to.
    #[must_use]
    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    /// Attempts spent, including the first.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Why the task failed or stopped, if it did.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Final path component of the destination, for display.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.destination_path.file_name().map_or_else(
            || self.destination_path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_has_no_expected_size() {
        let task = DownloadTask::new("https://example.com/01.mp3", "/music/01.mp3");
        assert_eq!(task.source_url(), "https://example.com/01.mp3");
        assert_eq!(task.destination_path(), Path::new("/music/01.mp3"));
        assert_eq!(task.expected_size(), None);
        assert_eq!(task.with_expected_size(42).expected_size(), Some(42));
    }

    #[test]
    fn test_status_success_classification() {
        assert!(TransferStatus::Skipped.is_success());
        assert!(TransferStatus::Completed.is_success());
        assert!(TransferStatus::CompletedUnverified.is_success());
        assert!(!TransferStatus::Incomplete.is_success());
        assert!(!TransferStatus::Failed.is_success());
        assert!(!TransferStatus::Cancelled.is_success());
    }

    #[test]
    fn test_result_into_failed_keeps_bytes() {
        let result = TransferResult::new(TransferStatus::Incomplete, "/m/01.mp3", 9000, Some(20000))
            .with_attempts(5)
            .into_failed("max attempts (5) exhausted");
        assert_eq!(result.status(), TransferStatus::Failed);
        assert_eq!(result.bytes_transferred(), 9000);
        assert_eq!(result.expected_size(), Some(20000));
        assert_eq!(result.attempts(), 5);
        assert!(result.reason().unwrap().contains("exhausted"));
    }

    #[test]
    fn test_result_file_name_is_last_component() {
        let result = TransferResult::new(TransferStatus::Completed, "/m/album/cover.jpg", 1, Some(1));
        assert_eq!(result.file_name(), "cover.jpg");
    }

    #[test]
    fn test_result_serializes_status_in_snake_case() {
        let result =
            TransferResult::new(TransferStatus::CompletedUnverified, "/m/02.mp3", 10, None);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"completed_unverified\""), "{json}");
        assert!(json.contains("\"expected_size\":null"), "{json}");
        assert!(!json.contains("reason"), "{json}");
    }
}
