//! Error taxonomy for `Request::execute`.
//!
//! # Design
//! Every failure surfaces as exactly one `HttpError`, classified by what
//! went wrong rather than where in the code it happened. Transport failures
//! are mapped from their kind and, for timeouts, from the phase they hit.
//! Each variant carries a human-readable message; `kind()` gives the
//! fieldless category for callers that only need to branch.

use crate::transport::{Phase, TransportError, TransportErrorKind};

/// Errors returned by `Request::execute`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    /// Host or path missing, or a header or target that cannot be sent.
    /// No I/O was attempted.
    #[error("invalid request configuration: {0}")]
    Configuration(String),

    /// Name resolution or TCP connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The TLS handshake failed. Only possible with SSL enabled.
    #[error("TLS handshake failed: {0}")]
    Tls(String),

    /// Sending the request or receiving the response failed part way.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The server's response could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request was cancelled through its `CancelHandle`, either while
    /// running or before it started.
    #[error("request cancelled")]
    Cancelled,
}

/// Fieldless category of an `HttpError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Tls,
    Transfer,
    Protocol,
    Cancelled,
}

impl HttpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HttpError::Configuration(_) => ErrorKind::Configuration,
            HttpError::Connection(_) => ErrorKind::Connection,
            HttpError::Tls(_) => ErrorKind::Tls,
            HttpError::Transfer(_) => ErrorKind::Transfer,
            HttpError::Protocol(_) => ErrorKind::Protocol,
            HttpError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<TransportError> for HttpError {
    fn from(err: TransportError) -> Self {
        let message = err.message().to_string();
        match err.kind() {
            TransportErrorKind::Resolve | TransportErrorKind::Connect | TransportErrorKind::Tunnel => {
                HttpError::Connection(message)
            }
            TransportErrorKind::Tls => HttpError::Tls(message),
            TransportErrorKind::TimedOut => match err.phase() {
                Phase::Connecting => HttpError::Connection(message),
                Phase::TlsHandshake => HttpError::Tls(message),
                Phase::Requesting | Phase::Receiving => HttpError::Transfer(message),
            },
            TransportErrorKind::Io | TransportErrorKind::Truncated => HttpError::Transfer(message),
            TransportErrorKind::Protocol => HttpError::Protocol(message),
            TransportErrorKind::InvalidRequest => HttpError::Configuration(message),
            TransportErrorKind::Aborted => HttpError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(kind: TransportErrorKind, phase: Phase) -> HttpError {
        HttpError::from(TransportError::new(kind, phase, "boom"))
    }

    #[test]
    fn connect_phase_failures_are_connection_errors() {
        assert_eq!(map(TransportErrorKind::Resolve, Phase::Connecting).kind(), ErrorKind::Connection);
        assert_eq!(map(TransportErrorKind::Connect, Phase::Connecting).kind(), ErrorKind::Connection);
        assert_eq!(map(TransportErrorKind::Tunnel, Phase::Connecting).kind(), ErrorKind::Connection);
        assert_eq!(map(TransportErrorKind::TimedOut, Phase::Connecting).kind(), ErrorKind::Connection);
    }

    #[test]
    fn timeouts_follow_the_phase() {
        assert_eq!(map(TransportErrorKind::TimedOut, Phase::TlsHandshake).kind(), ErrorKind::Tls);
        assert_eq!(map(TransportErrorKind::TimedOut, Phase::Requesting).kind(), ErrorKind::Transfer);
        assert_eq!(map(TransportErrorKind::TimedOut, Phase::Receiving).kind(), ErrorKind::Transfer);
    }

    #[test]
    fn remaining_kinds() {
        assert_eq!(map(TransportErrorKind::Tls, Phase::TlsHandshake).kind(), ErrorKind::Tls);
        assert_eq!(map(TransportErrorKind::Io, Phase::Requesting).kind(), ErrorKind::Transfer);
        assert_eq!(map(TransportErrorKind::InvalidRequest, Phase::Connecting).kind(), ErrorKind::Configuration);
        assert_eq!(map(TransportErrorKind::Truncated, Phase::Receiving).kind(), ErrorKind::Transfer);
        assert_eq!(map(TransportErrorKind::Protocol, Phase::Receiving).kind(), ErrorKind::Protocol);
        assert_eq!(map(TransportErrorKind::Aborted, Phase::Receiving), HttpError::Cancelled);
    }

    #[test]
    fn messages_are_human_readable() {
        let err = map(TransportErrorKind::Connect, Phase::Connecting);
        assert_eq!(err.to_string(), "connection failed: boom");
        assert_eq!(HttpError::Cancelled.to_string(), "request cancelled");
    }
}
