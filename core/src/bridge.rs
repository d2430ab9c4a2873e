//! Callback bridge between the transfer engine and one `Request` call.
//!
//! # Design
//! The bridge is built inside `Request::execute` and borrows the request's
//! progress cell, its cancel flag and the in-progress `ResponseBuffer`. The
//! borrows tie its lifetime to the call, so no callback can reach it after
//! `execute` returns.
//!
//! Phase changes arrive from inside the engine's connection, which needs
//! an owned observer. `PhaseReporter` holds shared handles only and never
//! touches the response.

use std::sync::Arc;

use log::{debug, trace, warn};
use uuid::Uuid;

use crate::http::HttpState;
use crate::progress::{CancelHandle, Progress};
use crate::response::ResponseBuffer;
use crate::transport::{trim_line_ending, Control, Phase, PhaseObserver, TransferHandler};

/// Maps engine phases onto the request's lifecycle state.
pub(crate) struct PhaseReporter {
    id: Uuid,
    progress: Arc<Progress>,
    cancel: CancelHandle,
}

impl PhaseReporter {
    pub(crate) fn new(id: Uuid, progress: Arc<Progress>, cancel: CancelHandle) -> Self {
        Self { id, progress, cancel }
    }
}

impl PhaseObserver for PhaseReporter {
    fn enter(&self, phase: Phase) {
        let state = match phase {
            Phase::Connecting => HttpState::Connecting,
            Phase::TlsHandshake => HttpState::SslHandshake,
            Phase::Requesting => HttpState::Requesting,
            Phase::Receiving => HttpState::Receiving,
        };
        debug!("[{}] {state}", self.id);
        self.progress.set_state(state);
    }

    fn should_abort(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub(crate) struct CallbackBridge<'a> {
    id: Uuid,
    progress: &'a Progress,
    cancel: &'a CancelHandle,
    response: &'a mut ResponseBuffer,
    seen_content_length: bool,
    overrun_reported: bool,
}

impl<'a> CallbackBridge<'a> {
    pub(crate) fn new(
        id: Uuid,
        progress: &'a Progress,
        cancel: &'a CancelHandle,
        response: &'a mut ResponseBuffer,
    ) -> Self {
        Self {
            id,
            progress,
            cancel,
            response,
            seen_content_length: false,
            overrun_reported: false,
        }
    }

    fn record_content_length(&mut self, line: &str) {
        if self.seen_content_length {
            return;
        }
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        if !name.trim().eq_ignore_ascii_case("Content-Length") {
            return;
        }
        self.seen_content_length = true;
        match value.trim().parse::<usize>() {
            Ok(total) => self.progress.set_total(total),
            Err(_) => debug!("[{}] ignoring unparsable Content-Length {value:?}", self.id),
        }
    }
}

impl TransferHandler for CallbackBridge<'_> {
    fn header_line(&mut self, line: &[u8]) -> Control {
        if self.cancel.is_cancelled() {
            debug!("[{}] cancelled while reading headers", self.id);
            return Control::Abort;
        }
        let trimmed = trim_line_ending(line);
        if trimmed.is_empty() {
            return Control::Continue;
        }
        let text = String::from_utf8_lossy(trimmed).into_owned();
        trace!("[{}] header: {text}", self.id);
        self.record_content_length(&text);
        self.response.push_header(text);
        Control::Continue
    }

    fn data(&mut self, chunk: &[u8]) -> Control {
        if self.cancel.is_cancelled() {
            debug!("[{}] cancelled after {} body bytes", self.id, self.response.body_len());
            return Control::Abort;
        }
        self.response.push_body(chunk);
        let read = self.progress.add_read(chunk.len());
        let total = self.progress.bytes_total();
        if total != 0 && read > total && !self.overrun_reported {
            warn!("[{}] received {read} bytes but Content-Length announced {total}", self.id);
            self.overrun_reported = true;
        }
        trace!("[{}] body chunk of {} bytes ({read}/{total})", self.id, chunk.len());
        Control::Continue
    }
}
