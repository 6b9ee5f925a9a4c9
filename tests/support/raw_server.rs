//! Minimal HTTP/1.1 server over raw TCP for behaviours wiremock cannot
//! express: missing Content-Length, bodies cut short, stalled connections.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::localhost_available;

/// What the server does with one connection.
pub enum Reply {
    /// Write these bytes, then close.
    Bytes(Vec<u8>),
    /// Wait, write these bytes, then close.
    Delayed(Duration, Vec<u8>),
    /// Write these bytes, then keep the connection open without sending more.
    Stall(Vec<u8>),
}

type Handler = dyn Fn(usize, &str) -> Reply + Send + Sync;

pub struct RawServer {
    addr: SocketAddr,
    accept_loop: JoinHandle<()>,
    requests: Arc<Mutex<Vec<String>>>,
    peak: Arc<AtomicUsize>,
}

impl RawServer {
    /// Starts a server; `handler` gets the 0-based connection index and the request head.
    /// Returns `None` when localhost sockets are unavailable.
    pub async fn start<F>(handler: F) -> Option<Self>
    where
        F: Fn(usize, &str) -> Reply + Send + Sync + 'static,
    {
        if !localhost_available() {
            return None;
        }
        let handler: Arc<Handler> = Arc::new(handler);
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let accept_loop = {
            let requests = Arc::clone(&requests);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let mut index = 0;
                while let Ok((mut socket, _)) = listener.accept().await {
                    let handler = Arc::clone(&handler);
                    let requests = Arc::clone(&requests);
                    let current = Arc::clone(&current);
                    let peak = Arc::clone(&peak);
                    let conn = index;
                    index += 1;
                    tokio::spawn(async move {
                        let Some(head) = read_head(&mut socket).await else {
                            return;
                        };
                        requests.lock().unwrap().push(head.clone());
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        match handler(conn, &head) {
                            Reply::Bytes(bytes) => {
                                let _ = socket.write_all(&bytes).await;
                            }
                            Reply::Delayed(delay, bytes) => {
                                tokio::time::sleep(delay).await;
                                let _ = socket.write_all(&bytes).await;
                            }
                            Reply::Stall(bytes) => {
                                let _ = socket.write_all(&bytes).await;
                                let _ = socket.flush().await;
                                // hold until the client gives up
                                let mut sink = [0u8; 64];
                                while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
                            }
                        }
                        let _ = socket.shutdown().await;
                        current.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Some(Self {
            addr,
            accept_loop,
            requests,
            peak,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of connections handled at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for RawServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf[..end]).into_owned());
        }
    }
}

/// `Range: bytes=<start>-` start offset of a request head, if any.
pub fn range_start(head: &str) -> Option<u64> {
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("range")
                .then(|| value.trim().to_string())
        })
        .and_then(|value| {
            value
                .strip_prefix("bytes=")?
                .split_once('-')?
                .0
                .parse()
                .ok()
        })
}

/// Response head plus body. `content_length` may differ from `body.len()`
/// to simulate truncation; `None` omits the header.
pub fn response(status: &str, content_length: Option<u64>, extra: &[(&str, String)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status}\r\nConnection: close\r\n");
    if let Some(len) = content_length {
        out.push_str(&format!("Content-Length: {len}\r\n"));
    }
    for (name, value) in extra {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str("\r\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}
