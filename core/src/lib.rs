//! Blocking single-shot HTTP/HTTPS requests with live progress.
//!
//! # Overview
//! A `Request` is configured through setters and then executed. `execute`
//! blocks the calling thread for the whole exchange: connect (optionally
//! through a proxy), negotiate TLS when asked to, send the request, and
//! collect the response's status, raw header lines and raw body into a
//! `Response`. Failures at any phase come back as one classified
//! `HttpError`; partial data is never handed out.
//!
//! # Design
//! - `transport` drives ureq for one exchange and reports phases through a
//!   `PhaseObserver`, then raw header lines and body chunks through the
//!   `TransferHandler` callbacks.
//! - A per-call callback bridge connects those callbacks to the request's
//!   progress counters and the in-progress response, and cannot outlive the
//!   call.
//! - Progress (`bytes_read`, `bytes_total`, lifecycle state) lives in atomics
//!   so a `ProgressMonitor` can poll it from another thread.
//! - No pooling, retries, redirects or body decoding; callers layer those on
//!   top.

mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod progress;
pub mod response;
pub mod status;
pub mod transport;

pub use client::Request;
pub use config::{Proxy, RequestConfig, TransportOptions, DEFAULT_AGENT, DEFAULT_PORT};
pub use error::{ErrorKind, HttpError};
pub use http::{HttpMethod, HttpState};
pub use progress::{CancelHandle, ProgressMonitor};
pub use response::Response;
pub use status::{reason_phrase, StatusClass};
