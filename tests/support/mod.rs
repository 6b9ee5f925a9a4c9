#![allow(dead_code)]

//! Shared fixtures for the integration tests.
//!
//! Tests that need a localhost server go through [`require_mock_server!`]
//! or [`require_raw_server!`], which turn an environment that forbids
//! binding 127.0.0.1 into a skipped (passing) test. Set
//! `ALBUMDL_STRICT_NETWORK_TESTS=1` in CI to make that a failure instead.

pub mod raw_server;

use std::net::TcpListener;

use wiremock::MockServer;

const STRICT_ENV: &str = "ALBUMDL_STRICT_NETWORK_TESTS";

/// Deterministic non-repeating payload, so misplaced ranges show up as content mismatches.
#[must_use]
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Whether a localhost listener can be opened here.
pub fn localhost_available() -> bool {
    let Err(error) = TcpListener::bind("127.0.0.1:0") else {
        return true;
    };
    let strict = std::env::var(STRICT_ENV).is_ok_and(|v| !v.is_empty() && v != "0");
    assert!(!strict, "cannot bind 127.0.0.1 ({error}) and {STRICT_ENV} is set");
    eprintln!("skipping: cannot bind 127.0.0.1 ({error}); set {STRICT_ENV}=1 to fail instead");
    false
}

/// A running wiremock server, or `None` when localhost is off limits.
pub async fn mock_server() -> Option<MockServer> {
    if localhost_available() {
        Some(MockServer::start().await)
    } else {
        None
    }
}

/// Value a test returns when it skips itself.
pub trait Skipped {
    fn skipped() -> Self;
}

impl Skipped for () {
    fn skipped() -> Self {}
}

impl<E> Skipped for Result<(), E> {
    fn skipped() -> Self {
        Ok(())
    }
}

/// Starts a wiremock server or returns early from the calling test.
#[allow(unused_macros)]
macro_rules! require_mock_server {
    () => {
        match $crate::support::mock_server().await {
            Some(server) => server,
            None => return $crate::support::Skipped::skipped(),
        }
    };
}

/// Starts a [`raw_server::RawServer`] with `handler` or returns early from the calling test.
#[allow(unused_macros)]
macro_rules! require_raw_server {
    ($handler:expr) => {
        match $crate::support::raw_server::RawServer::start($handler).await {
            Some(server) => server,
            None => return $crate::support::Skipped::skipped(),
        }
    };
}
