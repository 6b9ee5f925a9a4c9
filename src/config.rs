//! Run configuration for the transfer core.
//!
//! [`TransferOptions`] is built once by the caller (normally the CLI layer)
//! before any worker starts and is only ever read afterwards. There is no
//! process-global configuration.

use std::time::Duration;

use thiserror::Error;

use crate::download::constants::DEFAULT_NETWORK_TIMEOUT;
use crate::download::{DEFAULT_CONCURRENCY, RetryPolicy};

/// Errors raised while building configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The SOCKS proxy definition could not be understood.
    #[error("invalid SOCKS proxy {value:?}: {reason} (expected \"host:port\" without a scheme)")]
    InvalidProxy {
        /// The rejected input.
        value: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// A SOCKS5 proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksProxy {
    host: String,
    port: u16,
}

impl SocksProxy {
    /// Creates a proxy endpoint from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host:port`. A scheme such as `socks5://` or `http://` is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProxy`] when the value has a scheme, no
    /// colon, an empty host, or a port that is not a number in `1..=65535`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidProxy {
            value: value.to_string(),
            reason,
        };
        let trimmed = value.trim();
        if trimmed.contains("://") {
            return Err(invalid("scheme prefix is not allowed"));
        }
        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }
        Ok(Self::new(host, port))
    }

    /// Host name or address of the proxy.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port of the proxy.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Proxy URL handed to the HTTP client. Host names resolve through the proxy.
    #[must_use]
    pub fn proxy_url(&self) -> String {
        format!("socks5h://{}:{}", self.host, self.port)
    }
}

/// How chatty logging should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Per-file outcomes and warnings.
    #[default]
    Normal,
    /// Transfer decisions (resume offsets, modes, retries).
    Debug,
    /// Everything, including HTTP client internals.
    Trace,
}

impl Verbosity {
    /// Maps CLI flags to a level. `quiet` wins over any `-v` count.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// `tracing` filter directive for this level.
    #[must_use]
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Immutable options for one run of the transfer core.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    concurrency_limit: usize,
    network_timeout: Duration,
    socks_proxy: Option<SocksProxy>,
    verbosity: Verbosity,
    retry_policy: RetryPolicy,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
            socks_proxy: None,
            verbosity: Verbosity::default(),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl TransferOptions {
    /// Creates options with the given worker count and defaults elsewhere.
    ///
    /// The value is validated when the scheduler is built.
    #[must_use]
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit,
            ..Self::default()
        }
    }

    /// Sets the connect/read timeout.
    #[must_use]
    pub fn with_network_timeout(mut self, network_timeout: Duration) -> Self {
        self.network_timeout = network_timeout;
        self
    }

    /// Routes all traffic through a SOCKS5 proxy.
    #[must_use]
    pub fn with_socks_proxy(mut self, proxy: SocksProxy) -> Self {
        self.socks_proxy = Some(proxy);
        self
    }

    /// Sets the logging level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Number of simultaneous transfers.
    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Connect and per-read timeout.
    #[must_use]
    pub fn network_timeout(&self) -> Duration {
        self.network_timeout
    }

    /// Proxy, if one is configured.
    #[must_use]
    pub fn socks_proxy(&self) -> Option<&SocksProxy> {
        self.socks_proxy.as_ref()
    }

    /// Logging level.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Retry policy shared by all workers.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}
