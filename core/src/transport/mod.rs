//! Blocking single-exchange transfer engine on top of ureq.
//!
//! # Overview
//! `perform` runs one complete exchange on a fresh ureq agent: resolve and
//! connect (directly or through a CONNECT proxy), optionally negotiate TLS,
//! send the request, then read the response. It knows nothing about the
//! caller's request or response types. What it learns reaches the caller
//! through two channels:
//!
//! - a `PhaseObserver`, told when the exchange enters the next phase and
//!   polled for an abort between socket operations;
//! - a `TransferHandler`, given each raw header line of the response head
//!   (line ending, blank block separators and interim status blocks
//!   included) and then each body chunk.
//!
//! Either handler callback may return `Control::Abort` to stop the transfer.
//!
//! # Design
//! ureq parses and frames the exchange. The raw head lines come from a tap
//! on the connection (see `tap`), so names keep their case and duplicates
//! keep their order. The agent is built per call and never pools, follows
//! redirects, decodes bodies, or turns error statuses into errors.

mod agent;
mod error;
mod tap;

use std::fmt;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::sync::Arc;

use log::{debug, trace};

use crate::config::TransportOptions;
use crate::http::HttpMethod;

pub use error::{TransportError, TransportErrorKind};

use tap::Tap;

/// Largest body chunk delivered to `TransferHandler::data`.
const READ_CHUNK: usize = 16 * 1024;

/// Phase the engine is in when it reports progress or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting = 0,
    TlsHandshake = 1,
    Requesting = 2,
    Receiving = 3,
}

impl Phase {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::TlsHandshake,
            2 => Phase::Requesting,
            3 => Phase::Receiving,
            _ => Phase::Connecting,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "connecting",
            Phase::TlsHandshake => "tls handshake",
            Phase::Requesting => "requesting",
            Phase::Receiving => "receiving",
        };
        f.write_str(name)
    }
}

/// Returned by handler callbacks to continue or stop the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Abort,
}

/// Side of a transfer's observer that ureq may call from inside its
/// connection. Each phase is reported once, in order.
pub trait PhaseObserver: Send + Sync + 'static {
    fn enter(&self, phase: Phase);

    /// Polled before each socket read or write; `true` stops the exchange.
    fn should_abort(&self) -> bool;
}

/// Receiver of the response. See the module docs for the event order.
pub trait TransferHandler {
    /// Called once per received header line, with its line ending.
    fn header_line(&mut self, line: &[u8]) -> Control;

    /// Called once per body chunk. The slice is only valid for the call.
    fn data(&mut self, chunk: &[u8]) -> Control;
}

/// Everything the engine needs to run one exchange.
#[derive(Debug, Clone)]
pub struct TransferSpec<'a> {
    pub method: HttpMethod,
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub use_tls: bool,
    pub proxy: Option<(&'a str, u16)>,
    pub agent: &'a str,
    /// Extra raw `Name: value` lines, sent in order.
    pub headers: &'a [String],
    /// Request body; `Some` also implies `Content-Length`.
    pub body: Option<&'a [u8]>,
    pub options: &'a TransportOptions,
}

impl TransferSpec<'_> {
    /// `host[:port]`, omitting the port when it is the scheme default.
    pub(crate) fn authority(&self) -> String {
        let default_port = if self.use_tls { 443 } else { 80 };
        if self.port == default_port {
            bracketed(self.host)
        } else {
            format!("{}:{}", bracketed(self.host), self.port)
        }
    }

    pub(crate) fn url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{}{}", self.authority(), self.path)
    }
}

/// IPv6 literals need brackets inside a URL authority.
pub(crate) fn bracketed(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// Outcome of a completed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferInfo {
    /// Status code of the final (non-interim) response.
    pub status: u16,
}

/// Run one request/response exchange, blocking until it completes.
pub fn perform<H: TransferHandler>(
    spec: &TransferSpec<'_>,
    observer: Arc<dyn PhaseObserver>,
    handler: &mut H,
) -> Result<TransferInfo, TransportError> {
    let tap = Arc::new(Tap::new(observer, spec.options.max_head_bytes));
    tap.enter(Phase::Connecting);

    let agent = agent::build(spec, &tap)?;
    let response = agent::send(&agent, spec).map_err(|e| fail(&tap, TransportError::from_ureq(e, tap.phase())))?;
    tap.enter(Phase::Receiving);
    let status = response.status().as_u16();

    let head = tap.take_head();
    let head_len = final_head_len(&head).unwrap_or(head.len());
    for line in head[..head_len].split_inclusive(|b| *b == b'\n') {
        if handler.header_line(line) == Control::Abort {
            return Err(TransportError::aborted(Phase::Receiving));
        }
    }

    let mut reader = response.into_body().into_reader();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut received = 0usize;
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(fail(&tap, TransportError::from_io(e, Phase::Receiving))),
        };
        received += n;
        if handler.data(&chunk[..n]) == Control::Abort {
            return Err(TransportError::aborted(Phase::Receiving));
        }
    }
    trace!("read {received} body bytes");
    debug!("transfer complete with status {status}");
    Ok(TransferInfo { status })
}

/// An abort requested through the observer wins over whatever ureq made of it.
fn fail(tap: &Tap, err: TransportError) -> TransportError {
    if tap.was_aborted() {
        TransportError::aborted(tap.phase())
    } else {
        err
    }
}

/// Strip trailing CR and LF bytes.
pub(crate) fn trim_line_ending(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n'))
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// Length of the response head up to and including the blank line that
/// ends the first non-1xx block, or `None` while that line has not arrived.
pub(crate) fn final_head_len(raw: &[u8]) -> Option<usize> {
    let mut offset = 0;
    let mut at_block_start = true;
    let mut in_final_block = false;
    for line in raw.split_inclusive(|b| *b == b'\n') {
        if !line.ends_with(b"\n") {
            return None;
        }
        offset += line.len();
        if trim_line_ending(line).is_empty() {
            if in_final_block {
                return Some(offset);
            }
            at_block_start = true;
        } else if at_block_start {
            in_final_block = !is_interim_status(line);
            at_block_start = false;
        }
    }
    None
}

fn is_interim_status(status_line: &[u8]) -> bool {
    status_line
        .split(|b| *b == b' ')
        .nth(1)
        .is_some_and(|code| code.first() == Some(&b'1'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec<'a>(options: &'a TransportOptions, use_tls: bool, port: u16) -> TransferSpec<'a> {
        TransferSpec {
            method: HttpMethod::Get,
            host: "example.com",
            port,
            path: "/",
            use_tls,
            proxy: None,
            agent: "test",
            headers: &[],
            body: None,
            options,
        }
    }

    #[test]
    fn authority_omits_default_ports() {
        let options = TransportOptions::default();
        assert_eq!(spec(&options, false, 80).authority(), "example.com");
        assert_eq!(spec(&options, true, 443).authority(), "example.com");
        assert_eq!(spec(&options, false, 443).authority(), "example.com:443");
        assert_eq!(spec(&options, true, 8443).authority(), "example.com:8443");
    }

    #[test]
    fn authority_brackets_ipv6_literals() {
        let options = TransportOptions::default();
        let mut s = spec(&options, false, 8080);
        s.host = "::1";
        assert_eq!(s.authority(), "[::1]:8080");
    }

    #[test]
    fn url_follows_scheme_and_path() {
        let options = TransportOptions::default();
        let mut s = spec(&options, true, 8443);
        s.path = "/status?full=1";
        assert_eq!(s.url(), "https://example.com:8443/status?full=1");
    }

    #[test]
    fn trailing_line_endings_are_trimmed_only_at_the_end() {
        assert_eq!(trim_line_ending(b"A: b\r\n"), b"A: b");
        assert_eq!(trim_line_ending(b"\r\n"), b"");
        assert_eq!(trim_line_ending(b"A:\rb\n"), b"A:\rb");
        assert_eq!(trim_line_ending(b""), b"");
    }

    #[test]
    fn final_head_skips_interim_blocks() {
        let raw = b"HTTP/1.1 103 Early Hints\r\nLink: </a.css>\r\n\r\nHTTP/1.1 200 OK\r\nA: 1\r\n\r\nbody";
        assert_eq!(final_head_len(raw), Some(raw.len() - 4));
    }

    #[test]
    fn final_head_accepts_bare_line_feeds() {
        assert_eq!(final_head_len(b"HTTP/1.0 200 OK\nA: 1\n\nxyz"), Some(22));
    }

    #[test]
    fn incomplete_heads_have_no_length() {
        assert_eq!(final_head_len(b"HTTP/1.1 200 OK\r\nA: 1\r\n"), None);
        assert_eq!(final_head_len(b"HTTP/1.1 100 Continue\r\n\r\n"), None);
        assert_eq!(final_head_len(b"HTTP/1.1 200 OK\r\nA: 1"), None);
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::TlsHandshake.to_string(), "tls handshake");
        assert_eq!(Phase::Receiving.to_string(), "receiving");
    }

    #[test]
    fn phases_round_trip_through_u8() {
        for phase in [Phase::Connecting, Phase::TlsHandshake, Phase::Requesting, Phase::Receiving] {
            assert_eq!(Phase::from_u8(phase as u8), phase);
        }
    }
}
