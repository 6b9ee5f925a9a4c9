//! Error types for the download module.
//!
//! These are the per-attempt failures of a single transfer. The retry
//! controller classifies each one and turns it into a terminal
//! [`TransferResult`](super::TransferResult); none of them escape a worker.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during one transfer attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset, TLS, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response other than "not found".
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The resource does not exist (404/410, or a redirect to a not-found page).
    #[error("resource not found: {url} (ended at {final_url})")]
    NotFound {
        /// The requested URL.
        url: String,
        /// Where the request ended up after redirects.
        final_url: String,
    },

    /// The server kept answering with a payload too small to be real content.
    #[error("undersized response for {url}: {content_length} bytes looks like a limit page")]
    LimitPage {
        /// The requested URL.
        url: String,
        /// The Content-Length the server reported.
        content_length: u64,
    },

    /// A full body was offered in place of a range, but not of the probed size.
    #[error(
        "size of {url} changed: probed {expected} bytes, full response announces {}",
        .announced.map_or_else(|| "no length".to_string(), |len| format!("{len} bytes"))
    )]
    SizeChanged {
        /// The requested URL.
        url: String,
        /// Size reported by the probe.
        expected: u64,
        /// Content-Length of the full response, if any.
        announced: Option<u64>,
    },

    /// File system error while reading or writing the destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The batch was cancelled while this transfer was in flight.
    #[error("transfer of {url} cancelled")]
    Cancelled {
        /// The URL whose transfer was interrupted.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(url: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self::NotFound {
            url: url.into(),
            final_url: final_url.into(),
        }
    }

    /// Creates an undersized-response error.
    pub fn limit_page(url: impl Into<String>, content_length: u64) -> Self {
        Self::LimitPage {
            url: url.into(),
            content_length,
        }
    }

    /// Creates a size-changed error.
    pub fn size_changed(url: impl Into<String>, expected: u64, announced: Option<u64>) -> Self {
        Self::SizeChanged {
            url: url.into(),
            expected,
            announced,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Maps a reqwest error, separating timeouts from other transport failures.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs a
// URL or a path that the source error does not carry.
