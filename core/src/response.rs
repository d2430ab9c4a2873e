//! Response container: the in-progress accumulator and the finished value.
//!
//! # Design
//! `ResponseBuffer` is crate-private and append-only; only the callback
//! bridge writes to it while a call is in flight. `finish` consumes it, so
//! the `Response` a caller receives can no longer be mutated through the
//! buffer. A failed call simply drops the buffer, which is how partial data
//! is discarded.

use log::debug;

use crate::status::StatusClass;

/// Accumulator for one call's header lines and body bytes.
#[derive(Debug, Default)]
pub(crate) struct ResponseBuffer {
    headers: Vec<String>,
    body: Vec<u8>,
}

impl ResponseBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_header(&mut self, line: String) {
        self.headers.push(line);
    }

    pub(crate) fn push_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    pub(crate) fn body_len(&self) -> usize {
        self.body.len()
    }

    pub(crate) fn finish(self, status: u16) -> Response {
        Response {
            status,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// Result of a successful request: status, raw header lines and raw body.
///
/// Header lines are kept exactly as received minus their line endings, in
/// arrival order with duplicates preserved. Every header block contributes
/// its status line too, so a response preceded by `100 Continue` starts with
/// two status lines. Wrap in an `Arc` to share it between readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<String>,
    body: Vec<u8>,
}

impl Response {
    /// Build a response from already-known parts, e.g. when restoring a
    /// cached body.
    pub fn from_parts(status: u16, headers: Vec<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_code(self.status)
    }

    pub fn is_success(&self) -> bool {
        self.status_class() == StatusClass::Success
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Value of the first header named `name` (ASCII case-insensitive),
    /// trimmed. Status lines are never matched.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|line| !line.starts_with("HTTP/"))
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Log every header line at debug level.
    pub fn dump_headers(&self) {
        debug!("response status {} with {} header lines", self.status, self.headers.len());
        for line in &self.headers {
            debug!("  {line}");
        }
    }

    /// Log the body at debug level, lossily decoded for readability.
    pub fn dump_data(&self) {
        debug!(
            "response body ({} bytes):\n{}",
            self.body.len(),
            String::from_utf8_lossy(&self.body)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Response {
        Response::from_parts(
            200,
            vec![
                "HTTP/1.1 200 OK".to_string(),
                "Content-Type: text/plain".to_string(),
                "Set-Cookie: a=1".to_string(),
                "set-cookie: b=2".to_string(),
            ],
            b"hello".to_vec(),
        )
    }

    #[test]
    fn buffer_starts_empty_and_accumulates_in_order() {
        let mut buffer = ResponseBuffer::new();
        assert_eq!(buffer.body_len(), 0);
        buffer.push_header("A: 1".to_string());
        buffer.push_header("B: 2".to_string());
        buffer.push_body(b"ab");
        buffer.push_body(b"cd");
        let response = buffer.finish(204);
        assert_eq!(response.status(), 204);
        assert_eq!(response.headers(), ["A: 1", "B: 2"]);
        assert_eq!(response.body(), b"abcd");
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_returns_first() {
        let response = sample();
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.header("SET-COOKIE"), Some("a=1"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn header_lookup_skips_status_lines() {
        let response = Response::from_parts(200, vec!["HTTP/1.1 200 OK".to_string()], Vec::new());
        assert_eq!(response.header("HTTP/1.1 200 OK"), None);
        assert!(response.is_empty());
    }

    #[test]
    fn success_follows_status_class() {
        assert!(sample().is_success());
        let missing = Response::from_parts(404, Vec::new(), Vec::new());
        assert!(!missing.is_success());
        assert_eq!(missing.status_class(), StatusClass::ClientError);
    }

    #[test]
    fn into_body_hands_over_bytes() {
        let response = sample();
        assert_eq!(response.len(), 5);
        assert_eq!(response.into_body(), b"hello".to_vec());
    }
}
