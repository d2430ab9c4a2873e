//! Connector links that watch one exchange from inside the ureq chain.
//!
//! # Design
//! ureq owns the socket, so phase changes and the raw response head are
//! observed from two links spliced into its connector chain:
//!
//! - `HandshakeMarker` sits in front of the TLS connector and reports the
//!   handshake before it starts.
//! - `TapConnector` wraps the finished connection in a `TapTransport`,
//!   which reports `Requesting` on the first write, `Receiving` on the first
//!   byte read, and copies incoming bytes until the final response head is
//!   complete.
//!
//! Both links share one `Tap`. The tap also records the current phase so a
//! failure can be classified by where it happened.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::trace;
use ureq::unversioned::transport::{
    Buffers, ConnectionDetails, Connector, Either, NextTimeout, Transport,
};

use super::{final_head_len, Phase, PhaseObserver};

/// Returned through ureq when the observer asks the exchange to stop.
#[derive(Debug, thiserror::Error)]
#[error("transfer aborted by observer")]
pub(crate) struct Aborted;

const NOT_STARTED: u8 = u8::MAX;

pub(crate) struct Tap {
    observer: Arc<dyn PhaseObserver>,
    phase: AtomicU8,
    aborted: AtomicBool,
    head: Mutex<HeadCapture>,
    head_limit: usize,
}

#[derive(Default)]
struct HeadCapture {
    bytes: Vec<u8>,
    complete: bool,
}

impl Tap {
    pub(crate) fn new(observer: Arc<dyn PhaseObserver>, head_limit: usize) -> Self {
        Self {
            observer,
            phase: AtomicU8::new(NOT_STARTED),
            aborted: AtomicBool::new(false),
            head: Mutex::new(HeadCapture::default()),
            head_limit,
        }
    }

    pub(crate) fn enter(&self, phase: Phase) {
        if self.phase.swap(phase as u8, Ordering::AcqRel) != phase as u8 {
            self.observer.enter(phase);
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether a failure was caused by the observer asking to stop.
    pub(crate) fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn check_abort(&self) -> Result<(), ureq::Error> {
        if self.observer.should_abort() {
            self.aborted.store(true, Ordering::Release);
            return Err(ureq::Error::Other(Box::new(Aborted)));
        }
        Ok(())
    }

    fn received(&self, bytes: &[u8]) {
        self.enter(Phase::Receiving);
        let mut head = self.head.lock().unwrap_or_else(PoisonError::into_inner);
        if head.complete {
            return;
        }
        let room = self.head_limit.saturating_sub(head.bytes.len());
        head.bytes.extend_from_slice(&bytes[..bytes.len().min(room)]);
        if let Some(len) = final_head_len(&head.bytes) {
            head.bytes.truncate(len);
            head.complete = true;
            trace!("response head complete after {len} bytes");
        } else if room <= bytes.len() {
            head.complete = true;
        }
    }

    /// The captured head, leaving the capture empty.
    pub(crate) fn take_head(&self) -> Vec<u8> {
        let mut head = self.head.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut head.bytes)
    }
}

impl fmt::Debug for Tap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tap")
            .field("phase", &self.phase())
            .field("aborted", &self.was_aborted())
            .finish_non_exhaustive()
    }
}

/// Reports `TlsHandshake` just before the TLS connector runs.
#[derive(Debug)]
pub(crate) struct HandshakeMarker {
    pub(crate) tap: Arc<Tap>,
}

impl<In: Transport> Connector<In> for HandshakeMarker {
    type Out = In;

    fn connect(&self, details: &ConnectionDetails, chained: Option<In>) -> Result<Option<In>, ureq::Error> {
        if let Some(transport) = &chained {
            if details.needs_tls() && !transport.is_tls() {
                self.tap.check_abort()?;
                self.tap.enter(Phase::TlsHandshake);
            }
        }
        Ok(chained)
    }
}

/// Last link of the chain: wraps the connection to the origin in a
/// `TapTransport`.
#[derive(Debug)]
pub(crate) struct TapConnector {
    pub(crate) tap: Arc<Tap>,
    pub(crate) proxied: bool,
}

impl<In: Transport> Connector<In> for TapConnector {
    type Out = Either<In, TapTransport<In>>;

    fn connect(&self, details: &ConnectionDetails, chained: Option<In>) -> Result<Option<Self::Out>, ureq::Error> {
        let Some(transport) = chained else {
            return Ok(None);
        };
        // The CONNECT leg runs this chain again with the proxy stripped from
        // its config. That connection talks to the proxy, not the origin.
        if self.proxied && details.config.proxy().is_none() {
            return Ok(Some(Either::A(transport)));
        }
        Ok(Some(Either::B(TapTransport {
            inner: transport,
            tap: Arc::clone(&self.tap),
            sent: false,
        })))
    }
}

#[derive(Debug)]
pub(crate) struct TapTransport<T> {
    inner: T,
    tap: Arc<Tap>,
    sent: bool,
}

impl<T: Transport> Transport for TapTransport<T> {
    fn buffers(&mut self) -> &mut dyn Buffers {
        self.inner.buffers()
    }

    fn transmit_output(&mut self, amount: usize, timeout: NextTimeout) -> Result<(), ureq::Error> {
        self.tap.check_abort()?;
        if !self.sent {
            self.sent = true;
            self.tap.enter(Phase::Requesting);
        }
        self.inner.transmit_output(amount, timeout)
    }

    fn await_input(&mut self, timeout: NextTimeout) -> Result<bool, ureq::Error> {
        self.tap.check_abort()?;
        let before = self.inner.buffers().input().len();
        let progressed = self.inner.await_input(timeout)?;
        let input = self.inner.buffers().input();
        if input.len() > before {
            self.tap.received(&input[before..]);
        }
        Ok(progressed)
    }

    fn is_open(&mut self) -> bool {
        self.inner.is_open()
    }

    fn is_tls(&self) -> bool {
        self.inner.is_tls()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        phases: Mutex<Vec<Phase>>,
        stop: AtomicBool,
    }

    impl PhaseObserver for Recorder {
        fn enter(&self, phase: Phase) {
            self.phases.lock().unwrap().push(phase);
        }

        fn should_abort(&self) -> bool {
            self.stop.load(Ordering::Acquire)
        }
    }

    fn tap(limit: usize) -> (Arc<Recorder>, Tap) {
        let recorder = Arc::new(Recorder::default());
        let tap = Tap::new(Arc::clone(&recorder) as Arc<dyn PhaseObserver>, limit);
        (recorder, tap)
    }

    #[test]
    fn repeated_phases_are_reported_once() {
        let (recorder, tap) = tap(1024);
        tap.enter(Phase::Requesting);
        tap.enter(Phase::Requesting);
        tap.received(b"HTTP/1.1 200 OK\r\n");
        tap.received(b"\r\n");
        assert_eq!(*recorder.phases.lock().unwrap(), [Phase::Requesting, Phase::Receiving]);
        assert_eq!(tap.phase(), Phase::Receiving);
    }

    #[test]
    fn capture_stops_at_the_final_head() {
        let (_, tap) = tap(1024);
        tap.received(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\n");
        tap.received(b"Content-Length: 4\r\n\r\nbody");
        tap.received(b"more body");
        assert_eq!(
            tap.take_head(),
            b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\n"
        );
    }

    #[test]
    fn capture_is_bounded() {
        let (_, tap) = tap(8);
        tap.received(b"HTTP/1.1 200 OK\r\n");
        tap.received(b"X: y\r\n\r\n");
        assert_eq!(tap.take_head(), b"HTTP/1.1");
    }

    #[test]
    fn abort_is_remembered() {
        let (recorder, tap) = tap(1024);
        assert!(tap.check_abort().is_ok());
        recorder.stop.store(true, Ordering::Release);
        assert!(matches!(tap.check_abort(), Err(ureq::Error::Other(_))));
        assert!(tap.was_aborted());
    }
}
