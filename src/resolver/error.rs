//! Error types for resolver operations.
//!
//! Every variant names the offending input and carries a suggestion, the
//! same What/Why/Fix shape the CLI prints verbatim.

use thiserror::Error;

/// Errors that can occur while turning input into a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A manifest line does not start with an absolute http(s) URL.
    #[error("line {line}: invalid URL '{url}'\n  Suggestion: {suggestion}")]
    InvalidUrl {
        /// 1-based manifest line.
        line: usize,
        /// The rejected URL text.
        url: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// No file name was given and none can be derived from the URL.
    #[error("line {line}: cannot derive a file name from '{url}'\n  Suggestion: {suggestion}")]
    MissingFilename {
        /// 1-based manifest line.
        line: usize,
        /// The URL without a usable last path segment.
        url: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// The file name would escape the working directory or is empty.
    #[error("invalid file name '{name}': {reason}\n  Suggestion: {suggestion}")]
    InvalidFilename {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// Two entries of one batch share a file name.
    #[error("file name '{name}' appears more than once\n  Suggestion: {suggestion}")]
    DuplicateFilename {
        /// The repeated name.
        name: String,
        /// How to fix the issue
        suggestion: String,
    },
}

impl ResolveError {
    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(line: usize, url: &str) -> Self {
        Self::InvalidUrl {
            line,
            url: url.to_string(),
            suggestion: "Start the line with an http:// or https:// URL".to_string(),
        }
    }

    /// Creates a `MissingFilename` error.
    #[must_use]
    pub fn missing_filename(line: usize, url: &str) -> Self {
        Self::MissingFilename {
            line,
            url: url.to_string(),
            suggestion: "Add the file name after the URL, separated by whitespace".to_string(),
        }
    }

    /// Creates an `InvalidFilename` error.
    #[must_use]
    pub fn invalid_filename(name: &str, reason: &str) -> Self {
        Self::InvalidFilename {
            name: name.to_string(),
            reason: reason.to_string(),
            suggestion: "Use a plain file name without directories".to_string(),
        }
    }

    /// Creates a `DuplicateFilename` error.
    #[must_use]
    pub fn duplicate_filename(name: &str) -> Self {
        Self::DuplicateFilename {
            name: name.to_string(),
            suggestion: "Give each entry its own file name".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_message() {
        let msg = ResolveError::invalid_url(3, "ftp://host/a.mp3").to_string();
        assert!(msg.contains("line 3"), "should contain line");
        assert!(msg.contains("ftp://host/a.mp3"), "should contain input");
        assert!(msg.contains("Suggestion"), "should have suggestion");
    }

    #[test]
    fn test_missing_filename_message() {
        let msg = ResolveError::missing_filename(1, "https://example.com/").to_string();
        assert!(msg.contains("cannot derive a file name"));
    }

    #[test]
    fn test_invalid_filename_message() {
        let msg = ResolveError::invalid_filename("../x.mp3", "must not contain '..'").to_string();
        assert!(msg.contains("../x.mp3"));
        assert!(msg.contains("'..'"));
    }

    #[test]
    fn test_duplicate_filename_message() {
        let msg = ResolveError::duplicate_filename("01.mp3").to_string();
        assert!(msg.contains("01.mp3"));
        assert!(msg.contains("more than once"));
    }
}
