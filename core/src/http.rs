//! Request method and lifecycle state.
//!
//! # Design
//! Both enums are fieldless so they map 1:1 onto C enums in the FFI crate
//! and, for `HttpState`, onto the `u8` stored in the atomic progress cell.

use std::fmt;

/// HTTP method for a request. POST carries a payload, GET carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a single request/response exchange.
///
/// `Ready` → `Connecting` → `SslHandshake` (only with SSL) → `Requesting`
/// → `Receiving` → `Done`. Any failure moves to `Error`. `Done` and `Error`
/// are terminal for the call that reached them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum HttpState {
    #[default]
    Ready = 0,
    Connecting = 1,
    SslHandshake = 2,
    Requesting = 3,
    Receiving = 4,
    Done = 5,
    Error = 6,
}

impl HttpState {
    pub fn is_terminal(self) -> bool {
        matches!(self, HttpState::Done | HttpState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpState::Ready => "ready",
            HttpState::Connecting => "connecting",
            HttpState::SslHandshake => "ssl handshake",
            HttpState::Requesting => "requesting",
            HttpState::Receiving => "receiving",
            HttpState::Done => "done",
            HttpState::Error => "error",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => HttpState::Connecting,
            2 => HttpState::SslHandshake,
            3 => HttpState::Requesting,
            4 => HttpState::Receiving,
            5 => HttpState::Done,
            6 => HttpState::Error,
            _ => HttpState::Ready,
        }
    }
}

impl fmt::Display for HttpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
