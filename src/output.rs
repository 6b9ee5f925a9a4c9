//! Terminal output for a batch run.

use albumdl_core::{BatchOutcome, Reporter, TransferResult, status_line};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar that prints each status line above itself.
pub(crate) struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub(crate) fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Reporter for ProgressReporter {
    fn report(&self, result: &TransferResult) {
        self.bar.println(status_line(result));
        self.bar.inc(1);
    }
}

/// One-line batch summary.
pub(crate) fn summary_line(outcome: &BatchOutcome) -> String {
    let mut line = format!(
        "{} file(s): {} downloaded, {} skipped, {} failed",
        outcome.total(),
        outcome.completed(),
        outcome.skipped(),
        outcome.failed()
    );
    if outcome.retried() > 0 {
        line.push_str(&format!(", {} retried attempt(s)", outcome.retried()));
    }
    if outcome.was_cancelled() {
        line.push_str(&format!(
            "; cancelled ({} interrupted, {} not started)",
            outcome.cancelled_count(),
            outcome.not_started()
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_for_empty_batch() {
        assert_eq!(
            summary_line(&BatchOutcome::default()),
            "0 file(s): 0 downloaded, 0 skipped, 0 failed"
        );
    }
}
