//! HTTP client wrapper for transfer requests.
//!
//! This module provides the `HttpClient` struct, built once from
//! [`TransferOptions`] and shared by every worker, plus the small header
//! helpers the transfer engine needs.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, RANGE};
use reqwest::{Client, Proxy, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use super::error::DownloadError;
use crate::config::TransferOptions;

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/albumdl/albumdl";

/// Path shape of the host's "page not found" target after a redirect.
#[allow(clippy::expect_used)]
static NOT_FOUND_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/404(?:[./?]|$)").expect("not-found regex is valid") // Static pattern, safe to panic
});

/// HTTP client for transfer requests.
///
/// Created once per batch and cloned into workers; clones share the
/// connection pool. Timeouts apply to connecting and to each body read,
/// never to a whole transfer, so large files are not cut off.
///
/// # Example
///
/// ```no_run
/// use albumdl_core::download::HttpClient;
/// use albumdl_core::TransferOptions;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::from_options(&TransferOptions::default())?;
/// let response = client.get("https://example.com/01-intro.mp3", None).await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default options (10 second timeouts, no proxy).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::from_options(&TransferOptions::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client honouring the timeout and proxy of `options`.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the proxy URL is rejected or the
    /// TLS backend cannot be initialised.
    #[instrument(level = "debug", skip(options), fields(timeout_secs = options.network_timeout().as_secs()))]
    pub fn from_options(options: &TransferOptions) -> Result<Self, reqwest::Error> {
        let timeout = options.network_timeout();
        let mut builder = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(default_user_agent());
        if let Some(proxy) = options.socks_proxy() {
            debug!(host = proxy.host(), port = proxy.port(), "using SOCKS proxy");
            builder = builder.proxy(Proxy::all(proxy.proxy_url())?);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Sends a GET for `url`, optionally restricted to an inclusive byte range.
    ///
    /// A success status is required. Responses that are 404/410, or that were
    /// redirected onto a `/404` page, become [`DownloadError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for anything but an absolute
    /// http(s) URL, [`DownloadError::Timeout`]/[`DownloadError::Network`] for
    /// transport failures, and [`DownloadError::HttpStatus`] for other error
    /// statuses.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn get(
        &self,
        url: &str,
        range: Option<(u64, u64)>,
    ) -> Result<reqwest::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let mut request = self.client.get(parsed.clone());
        if let Some((start, end)) = range {
            request = request.header(RANGE, range_header(start, end));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let final_url = response.url();
        if *final_url != parsed && NOT_FOUND_PATH.is_match(final_url.path()) {
            debug!(final_url = %final_url, "redirected to not-found page");
            return Err(DownloadError::not_found(url, final_url.as_str()));
        }

        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(DownloadError::not_found(url, final_url.as_str()));
        }
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Default User-Agent for transfer requests (identifies the tool).
fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("albumdl/{version} (+{PROJECT_UA_URL})")
}

/// `Range` header value for the inclusive byte span `start..=end`.
pub(crate) fn range_header(start: u64, end: u64) -> String {
    format!("bytes={start}-{end}")
}

/// Content-Length announced in `headers`, if present and numeric.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
