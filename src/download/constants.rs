//! Constants for the download module (thresholds, buffer sizes, timeouts).

use std::time::Duration;

/// Payloads of this many bytes or fewer are taken to be the host's
/// "limit exceeded" page rather than real file content.
pub const LIMIT_PAGE_THRESHOLD: u64 = 8192;

/// Write buffer size used while streaming a response body to disk.
pub const CHUNK_SIZE: usize = 8192;

/// Default number of size-probe requests per transfer attempt.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 5;

/// Default network timeout, applied to connect and to every body read.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);
