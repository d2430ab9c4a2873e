//! Progress counters and cooperative cancellation shared across threads.
//!
//! # Design
//! The executing thread is the only writer. Readers on other threads go
//! through `ProgressMonitor`, which holds its own `Arc` so it can outlive a
//! borrow of the `Request`. Values may be stale; they are for display only.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::http::HttpState;

#[derive(Debug, Default)]
pub(crate) struct Progress {
    bytes_read: AtomicUsize,
    bytes_total: AtomicUsize,
    state: AtomicU8,
}

impl Progress {
    /// Zero both counters before a new call.
    pub(crate) fn reset(&self) {
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_total.store(0, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, state: HttpState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn state(&self) -> HttpState {
        HttpState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Add `len` to the bytes read and return the new count.
    pub(crate) fn add_read(&self, len: usize) -> usize {
        self.bytes_read.fetch_add(len, Ordering::Relaxed) + len
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.bytes_total.store(total, Ordering::Relaxed);
    }

    /// Raise a total that the server under-reported to what actually
    /// arrived, restoring `bytes_read <= bytes_total` once a call succeeds.
    pub(crate) fn settle_total(&self) {
        let read = self.bytes_read();
        let total = self.bytes_total();
        if total != 0 && read > total {
            self.set_total(read);
        }
    }

    pub(crate) fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub(crate) fn bytes_total(&self) -> usize {
        self.bytes_total.load(Ordering::Relaxed)
    }
}

/// Read-only view of a request's progress, safe to poll from any thread.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    inner: Arc<Progress>,
}

impl ProgressMonitor {
    pub(crate) fn new(inner: Arc<Progress>) -> Self {
        Self { inner }
    }

    /// Body bytes received so far in the current or last call.
    pub fn bytes_read(&self) -> usize {
        self.inner.bytes_read()
    }

    /// Advertised body size. Zero means unknown, never "empty".
    pub fn bytes_total(&self) -> usize {
        self.inner.bytes_total()
    }

    pub fn state(&self) -> HttpState {
        self.inner.state()
    }

    /// Completed fraction clamped to `0.0..=1.0`, or `None` while the total
    /// is unknown.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.bytes_total();
        if total == 0 {
            return None;
        }
        let read = self.bytes_read().min(total);
        Some(read as f64 / total as f64)
    }
}

/// Cooperative cancellation flag for a request.
///
/// The flag is checked before each socket read or write and each time the
/// transport delivers a header line or a body chunk. A cancel stops exactly
/// one call: the running one, or the next one to start if none is running.
/// The flag clears once it has stopped a call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_reset_but_state_does_not() {
        let progress = Progress::default();
        progress.set_state(HttpState::Done);
        assert_eq!(progress.add_read(10), 10);
        assert_eq!(progress.add_read(5), 15);
        progress.set_total(20);
        progress.reset();
        assert_eq!(progress.bytes_read(), 0);
        assert_eq!(progress.bytes_total(), 0);
        assert_eq!(progress.state(), HttpState::Done);
    }

    #[test]
    fn fraction_is_none_when_total_unknown() {
        let progress = Arc::new(Progress::default());
        let monitor = ProgressMonitor::new(Arc::clone(&progress));
        progress.add_read(100);
        assert_eq!(monitor.fraction(), None);
    }

    #[test]
    fn fraction_clamps_misreported_totals() {
        let progress = Arc::new(Progress::default());
        let monitor = ProgressMonitor::new(Arc::clone(&progress));
        progress.set_total(10);
        progress.add_read(5);
        assert_eq!(monitor.fraction(), Some(0.5));
        progress.add_read(20);
        assert_eq!(monitor.fraction(), Some(1.0));
    }

    #[test]
    fn settled_total_covers_what_was_read() {
        let progress = Progress::default();
        progress.set_total(4);
        progress.add_read(11);
        progress.settle_total();
        assert_eq!(progress.bytes_total(), 11);

        let unknown = Progress::default();
        unknown.add_read(11);
        unknown.settle_total();
        assert_eq!(unknown.bytes_total(), 0);
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let handle = CancelHandle::default();
        let other = handle.clone();
        assert!(!handle.is_cancelled());
        other.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!other.is_cancelled());
    }
}
