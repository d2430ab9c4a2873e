//! Canned-bytes TCP server.
//!
//! Each accepted connection optionally reads one request (head plus any
//! `Content-Length` body), records it, writes the reply parts with a pause
//! between them, and closes. Useful for malformed, truncated or slow
//! responses that no real framework would emit. A tunnel reply reads a
//! second request after the first part, which is enough to stand in for a
//! CONNECT proxy in front of a plain origin.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Requests received so far, raw bytes per connection.
pub type Recorded = Arc<Mutex<Vec<Vec<u8>>>>;

/// What the server sends back on every connection.
#[derive(Clone, Debug)]
pub struct Reply {
    /// Read the client's request before replying.
    pub wait_for_request: bool,
    pub parts: Vec<Vec<u8>>,
    /// Delay between consecutive parts.
    pub pause: Duration,
    /// Read and record another request before each part after the first.
    pub request_per_part: bool,
}

impl Reply {
    /// Wait for the request, then send `bytes` and close.
    pub fn canned(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            wait_for_request: true,
            parts: vec![bytes.into()],
            pause: Duration::ZERO,
            request_per_part: false,
        }
    }

    /// Send `bytes` immediately on accept, without reading anything.
    pub fn eager(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            wait_for_request: false,
            ..Self::canned(bytes)
        }
    }

    /// Wait for the request, then send `parts` with `pause` between them.
    pub fn dripped(parts: Vec<Vec<u8>>, pause: Duration) -> Self {
        Self {
            wait_for_request: true,
            parts,
            pause,
            request_per_part: false,
        }
    }

    /// Answer a CONNECT with `established`, then read the tunnelled request
    /// and answer it with `reply`.
    pub fn tunnel(established: impl Into<Vec<u8>>, reply: impl Into<Vec<u8>>) -> Self {
        Self {
            wait_for_request: true,
            parts: vec![established.into(), reply.into()],
            pause: Duration::ZERO,
            request_per_part: true,
        }
    }
}

/// Handle to a raw server running on its own thread.
pub struct RawServer {
    addr: SocketAddr,
    requests: Recorded,
}

impl RawServer {
    /// Bind to a random loopback port and serve `reply` forever on a
    /// background thread.
    pub fn start(reply: Reply) -> std::io::Result<Self> {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = std_listener.local_addr()?;
        std_listener.set_nonblocking(true)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let requests = Recorded::default();
        let recorded = Arc::clone(&requests);
        std::thread::spawn(move || {
            runtime.block_on(async move {
                match TcpListener::from_std(std_listener) {
                    Ok(listener) => serve(listener, reply, recorded).await,
                    Err(e) => warn!("raw fixture on {addr} failed to start: {e}"),
                }
            });
        });
        Ok(Self { addr, requests })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Snapshot of the requests received so far.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

/// Accept connections on `listener` and answer each with `reply`.
pub async fn serve(listener: TcpListener, reply: Reply, recorded: Recorded) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        debug!("raw fixture accepted {peer}");
        let reply = reply.clone();
        let recorded = Arc::clone(&recorded);
        tokio::spawn(async move {
            if let Err(e) = handle(socket, &reply, &recorded).await {
                debug!("raw fixture connection from {peer} ended: {e}");
            }
        });
    }
}

async fn handle(mut socket: TcpStream, reply: &Reply, recorded: &Recorded) -> std::io::Result<()> {
    if reply.wait_for_request {
        record(&mut socket, recorded).await?;
    }
    for (i, part) in reply.parts.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(reply.pause).await;
            if reply.request_per_part {
                record(&mut socket, recorded).await?;
            }
        }
        socket.write_all(part).await?;
        socket.flush().await?;
    }
    socket.shutdown().await
}

async fn record(socket: &mut TcpStream, recorded: &Recorded) -> std::io::Result<()> {
    let request = read_request(socket).await?;
    if let Ok(mut requests) = recorded.lock() {
        requests.push(request);
    }
    Ok(())
}

/// Read one request head and its `Content-Length` body, or whatever
/// arrives before the client stops sending.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(head_end) = find_head_end(&buf) {
            let wanted = head_end + content_length(&buf[..head_end]);
            if buf.len() >= wanted {
                return Ok(buf);
            }
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
