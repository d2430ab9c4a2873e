use std::io;

use super::Phase;

/// What went wrong inside the transport, independent of the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Resolve,
    Connect,
    /// Proxy refused or botched the CONNECT tunnel.
    Tunnel,
    Tls,
    /// Socket failure while sending or receiving.
    Io,
    TimedOut,
    /// Peer closed before the announced amount of data arrived.
    Truncated,
    Protocol,
    /// The target could not be turned into a request.
    InvalidRequest,
    /// The observer or a handler callback asked the transfer to stop.
    Aborted,
}

/// Failure reported by `perform`, tagged with the phase it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    phase: Phase,
    message: String,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            kind,
            phase,
            message: message.into(),
        }
    }

    /// Classify a ureq failure. Variants ureq does not name precisely fall
    /// back on the phase they surfaced in.
    pub(crate) fn from_ureq(err: ureq::Error, phase: Phase) -> Self {
        let message = err.to_string();
        let kind = match err {
            ureq::Error::Io(e) => return Self::from_io(e, phase),
            ureq::Error::HostNotFound => TransportErrorKind::Resolve,
            ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
            ureq::Error::ConnectProxyFailed(_) | ureq::Error::InvalidProxyUrl => TransportErrorKind::Tunnel,
            ureq::Error::Tls(_) | ureq::Error::TlsRequired => TransportErrorKind::Tls,
            ureq::Error::Timeout(_) => TransportErrorKind::TimedOut,
            ureq::Error::Protocol(_) | ureq::Error::LargeResponseHeader(..) => TransportErrorKind::Protocol,
            ureq::Error::BadUri(_) | ureq::Error::Http(_) => TransportErrorKind::InvalidRequest,
            _ => match phase {
                Phase::Connecting => TransportErrorKind::Connect,
                Phase::TlsHandshake => TransportErrorKind::Tls,
                Phase::Requesting | Phase::Receiving => TransportErrorKind::Io,
            },
        };
        Self::new(kind, phase, message)
    }

    /// Classify an I/O error, unwrapping a ureq error carried inside it.
    pub(crate) fn from_io(err: io::Error, phase: Phase) -> Self {
        let io_kind = err.kind();
        let message = err.to_string();
        if err.get_ref().is_some_and(|inner| inner.is::<ureq::Error>()) {
            if let Some(Ok(inner)) = err.into_inner().map(|inner| inner.downcast::<ureq::Error>()) {
                return Self::from_ureq(*inner, phase);
            }
            return Self::new(kind_for_io(io_kind, phase), phase, message);
        }
        Self::new(kind_for_io(io_kind, phase), phase, message)
    }

    pub(crate) fn aborted(phase: Phase) -> Self {
        Self::new(TransportErrorKind::Aborted, phase, "transfer aborted")
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn kind_for_io(kind: io::ErrorKind, phase: Phase) -> TransportErrorKind {
    match (kind, phase) {
        (io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock, _) => TransportErrorKind::TimedOut,
        (_, Phase::Connecting) => TransportErrorKind::Connect,
        (_, Phase::TlsHandshake) => TransportErrorKind::Tls,
        (io::ErrorKind::UnexpectedEof, _) => TransportErrorKind::Truncated,
        _ => TransportErrorKind::Io,
    }
}
