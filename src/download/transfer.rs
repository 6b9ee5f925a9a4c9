//! Transfer engine: one resumable, verified attempt at one file.
//!
//! An attempt looks at what is already on disk, probes the server for the
//! real size, picks a [`TransferMode`] and streams the body into the
//! destination. It never retries the whole transfer itself and never
//! deletes the destination; partial data is left for the next attempt.

use std::fmt;
use std::path::Path;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_RANGE;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::cancel::CancelSignal;
use super::client::{HttpClient, content_length};
use super::constants::{CHUNK_SIZE, LIMIT_PAGE_THRESHOLD};
use super::error::DownloadError;
use super::retry::RetryPolicy;
use super::task::{TransferResult, TransferStatus};

/// How an attempt treats the bytes already at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Nothing usable on disk; write from offset 0.
    Fresh,
    /// Continue from the on-disk size with a range request.
    Resume,
    /// The destination already holds the whole file.
    Skip,
    /// On-disk bytes cannot be trusted against the remote size; write from 0.
    Restart,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fresh => "fresh",
            Self::Resume => "resume",
            Self::Skip => "skip",
            Self::Restart => "restart",
        })
    }
}

/// Engine-local state of one attempt. Rebuilt from the disk every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAttemptState {
    resume_offset: u64,
    expected_size: Option<u64>,
    mode: TransferMode,
}

impl TransferAttemptState {
    /// Derives the state from the on-disk size and the probed remote size.
    ///
    /// Files of [`LIMIT_PAGE_THRESHOLD`] bytes or fewer are treated as absent:
    /// they are most likely a saved "limit exceeded" page.
    #[must_use]
    pub fn new(on_disk: u64, expected_size: Option<u64>) -> Self {
        let trusted = if on_disk <= LIMIT_PAGE_THRESHOLD {
            0
        } else {
            on_disk
        };
        let mode = decide_mode(trusted, expected_size);
        let resume_offset = match mode {
            TransferMode::Fresh | TransferMode::Restart => 0,
            TransferMode::Resume | TransferMode::Skip => trusted,
        };
        Self {
            resume_offset,
            expected_size,
            mode,
        }
    }

    /// Bytes at the destination that this attempt builds on.
    #[must_use]
    pub fn resume_offset(&self) -> u64 {
        self.resume_offset
    }

    /// Probed remote size; `None` when it could not be determined.
    #[must_use]
    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    /// Chosen mode.
    #[must_use]
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// The server did not confirm partial content: start over from zero.
    fn fall_back_to_fresh(&mut self) {
        self.resume_offset = 0;
        self.mode = TransferMode::Fresh;
    }
}

/// Picks the mode for a trusted offset and a probed size.
fn decide_mode(resume_offset: u64, expected_size: Option<u64>) -> TransferMode {
    match expected_size {
        _ if resume_offset == 0 => TransferMode::Fresh,
        None => TransferMode::Restart,
        Some(expected) if resume_offset == expected => TransferMode::Skip,
        Some(expected) if resume_offset > expected => TransferMode::Restart,
        Some(_) => TransferMode::Resume,
    }
}

/// Classifies the end of a stream by comparing what arrived with what was announced.
fn finish(destination: &Path, bytes_transferred: u64, expected_size: Option<u64>) -> TransferResult {
    let status = match expected_size {
        None => TransferStatus::CompletedUnverified,
        Some(expected) if bytes_transferred == expected => TransferStatus::Completed,
        Some(expected) if bytes_transferred < expected => TransferStatus::Incomplete,
        Some(_) => TransferStatus::Failed,
    };
    let result = TransferResult::new(status, destination, bytes_transferred, expected_size);
    match (status, expected_size) {
        (TransferStatus::Incomplete, Some(expected)) => result.with_reason(format!(
            "stream ended after {bytes_transferred} of {expected} bytes"
        )),
        (TransferStatus::Failed, Some(expected)) => result.with_reason(format!(
            "received {bytes_transferred} bytes, more than the {expected} announced; file left for inspection"
        )),
        _ => result,
    }
}

/// Size of the destination, 0 when it does not exist.
async fn on_disk_len(path: &Path) -> Result<u64, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

/// Best-effort size of the destination for reporting.
pub(crate) async fn bytes_on_disk(path: &Path) -> u64 {
    on_disk_len(path).await.unwrap_or(0)
}

/// First byte position named by a `Content-Range: bytes <start>-<end>/<total>` header.
fn content_range_start(response: &reqwest::Response) -> Option<u64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    let span = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = span.split_once('-')?;
    start.trim().parse().ok()
}

/// Checks that a full-body answer is the file the probe described.
fn whole_body(
    response: reqwest::Response,
    url: &str,
    expected: u64,
) -> Result<reqwest::Response, DownloadError> {
    match content_length(response.headers()) {
        Some(len) if len == expected => Ok(response),
        Some(len) if len <= LIMIT_PAGE_THRESHOLD => Err(DownloadError::limit_page(url, len)),
        announced => Err(DownloadError::size_changed(url, expected, announced)),
    }
}

/// Performs single transfer attempts.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    client: HttpClient,
    policy: RetryPolicy,
}

impl TransferEngine {
    /// Creates an engine. `policy` supplies the size-probe bound and the
    /// pause between probes.
    #[must_use]
    pub fn new(client: HttpClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Returns the HTTP client used for requests.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Makes one attempt at bringing `destination` up to date with `source_url`.
    ///
    /// Returns `Ok` with `Skipped`, `Completed`, `CompletedUnverified`,
    /// `Incomplete` (stream ended short; retry) or `Failed` (more bytes than
    /// announced).
    ///
    /// # Errors
    ///
    /// Returns the [`DownloadError`] that stopped the attempt: transport and
    /// status errors, [`DownloadError::LimitPage`] when every size probe came
    /// back undersized or a range request was answered with a limit page,
    /// [`DownloadError::SizeChanged`] when a full body offered instead of a
    /// range has the wrong length, [`DownloadError::Io`] for destination
    /// problems and [`DownloadError::Cancelled`] when `cancel` fired mid-attempt.
    pub async fn fetch(
        &self,
        source_url: &str,
        destination: &Path,
        cancel: &CancelSignal,
    ) -> Result<TransferResult, DownloadError> {
        let mut probed = None;
        self.attempt(source_url, destination, cancel, &mut probed)
            .await
    }

    /// Same as [`fetch`](Self::fetch), recording the remote size in `probed`
    /// as soon as a probe yields one, so callers still know it when the
    /// attempt later fails.
    #[instrument(skip(self, cancel, probed), fields(url = %source_url, path = %destination.display()))]
    pub(crate) async fn attempt(
        &self,
        source_url: &str,
        destination: &Path,
        cancel: &CancelSignal,
        probed: &mut Option<u64>,
    ) -> Result<TransferResult, DownloadError> {
        let on_disk = on_disk_len(destination).await?;
        let (response, expected_size) = self.probe_size(source_url, cancel).await?;
        if expected_size.is_some() {
            *probed = expected_size;
        }
        let mut state = TransferAttemptState::new(on_disk, expected_size);
        debug!(
            on_disk,
            resume_offset = state.resume_offset(),
            expected_size,
            mode = %state.mode(),
            "transfer mode decided"
        );

        let response = match (state.mode(), expected_size) {
            (TransferMode::Skip, _) => {
                drop(response);
                info!(bytes = on_disk, "file already complete, skipped");
                return Ok(TransferResult::new(
                    TransferStatus::Skipped,
                    destination,
                    on_disk,
                    expected_size,
                ));
            }
            (TransferMode::Resume, Some(expected)) => {
                drop(response);
                self.request_tail(source_url, &mut state, expected, cancel)
                    .await?
            }
            (TransferMode::Restart, _) => {
                warn!(
                    on_disk,
                    expected_size,
                    "existing file is larger than the remote one or the size is unknown; downloading it again"
                );
                response
            }
            _ => response,
        };

        let append = state.mode() == TransferMode::Resume;
        let streamed = self
            .stream_to_file(response, source_url, destination, append, cancel)
            .await?;
        let bytes_transferred = state.resume_offset() + streamed;
        let result = finish(destination, bytes_transferred, expected_size);
        info!(
            bytes = bytes_transferred,
            expected_size,
            resumed = append,
            status = %result.status(),
            "transfer attempt finished"
        );
        Ok(result)
    }

    /// Requests the remote size, re-asking while the answer is missing or undersized.
    ///
    /// Returns the last response (body unread) with the usable size, or `None`
    /// when the server never sent a Content-Length within the probe bound.
    async fn probe_size(
        &self,
        url: &str,
        cancel: &CancelSignal,
    ) -> Result<(reqwest::Response, Option<u64>), DownloadError> {
        let max_probes = self.policy.probe_attempts();
        let mut probe = 0u32;
        loop {
            probe += 1;
            let response = self.send(url, None, cancel).await?;
            let announced = content_length(response.headers());
            match announced {
                Some(len) if len > LIMIT_PAGE_THRESHOLD => return Ok((response, Some(len))),
                _ if probe < max_probes => {
                    debug!(probe, max_probes, announced, "size probe unusable, asking again");
                    drop(response);
                    self.pause(url, cancel).await?;
                }
                None => {
                    warn!(
                        probes = probe,
                        "unable to get the real size from the server; transfer will be unverified"
                    );
                    return Ok((response, None));
                }
                Some(len) => return Err(DownloadError::limit_page(url, len)),
            }
        }
    }

    /// Asks for the bytes after `state.resume_offset()`. Falls back to a full
    /// body, and updates `state`, unless the server confirms the range.
    ///
    /// A full body replaces the partial file, so it is only accepted when it
    /// announces exactly `expected` bytes; anything else leaves the file alone.
    async fn request_tail(
        &self,
        url: &str,
        state: &mut TransferAttemptState,
        expected: u64,
        cancel: &CancelSignal,
    ) -> Result<reqwest::Response, DownloadError> {
        let offset = state.resume_offset();
        let response = self
            .send(url, Some((offset, expected - 1)), cancel)
            .await?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            debug!(
                status = response.status().as_u16(),
                "range/partial download is not supported by server; restarting from zero"
            );
            let response = whole_body(response, url, expected)?;
            state.fall_back_to_fresh();
            return Ok(response);
        }

        if content_range_start(&response).is_some_and(|start| start != offset) {
            warn!(
                offset,
                content_range_start = content_range_start(&response),
                "server answered a different range; restarting from zero"
            );
            drop(response);
            let response = whole_body(self.send(url, None, cancel).await?, url, expected)?;
            state.fall_back_to_fresh();
            return Ok(response);
        }

        debug!(offset, expected, "resuming partial download");
        Ok(response)
    }

    /// Streams the body into `path`, appending or truncating. Returns bytes written.
    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        url: &str,
        path: &Path,
        append: bool,
        cancel: &CancelSignal,
    ) -> Result<u64, DownloadError> {
        let file = if append {
            OpenOptions::new().create(true).append(true).open(path).await
        } else {
            File::create(path).await
        }
        .map_err(|e| DownloadError::io(path, e))?;

        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        let outcome = loop {
            let Some(next) = cancel.guard(stream.next()).await else {
                break Err(DownloadError::cancelled(url));
            };
            match next {
                None => break Ok(()),
                Some(Ok(chunk)) => {
                    if let Err(e) = writer.write_all(&chunk).await {
                        break Err(DownloadError::io(path, e));
                    }
                    written += chunk.len() as u64;
                }
                Some(Err(e)) => break Err(DownloadError::from_reqwest(url, e)),
            }
        };

        // Whatever arrived stays on disk for the next attempt.
        let flushed = writer.flush().await;
        if outcome.is_err() {
            debug!(written, "attempt stopped mid-stream, keeping partial data");
        }
        outcome?;
        flushed.map_err(|e| DownloadError::io(path, e))?;
        Ok(written)
    }

    async fn send(
        &self,
        url: &str,
        range: Option<(u64, u64)>,
        cancel: &CancelSignal,
    ) -> Result<reqwest::Response, DownloadError> {
        cancel
            .guard(self.client.get(url, range))
            .await
            .unwrap_or_else(|| Err(DownloadError::cancelled(url)))
    }

    async fn pause(&self, url: &str, cancel: &CancelSignal) -> Result<(), DownloadError> {
        cancel
            .guard(tokio::time::sleep(self.policy.backoff_delay()))
            .await
            .ok_or_else(|| DownloadError::cancelled(url))
    }
}
