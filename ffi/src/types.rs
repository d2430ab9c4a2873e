//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointer plus length instead of
//! `Vec`, and enums with explicit discriminants. Conversion functions live
//! here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use fetch_core::{CancelHandle, ErrorKind, HttpError, HttpMethod, HttpState, ProgressMonitor, Request, Response};

/// Opaque handle to a `Request`. C callers receive a pointer to this and
/// pass it back into every `fetch_request_*` function.
pub struct FfiRequest {
    pub(crate) inner: Request,
}

/// Opaque handle for polling a request's progress from another thread.
pub struct FfiMonitor {
    pub(crate) inner: ProgressMonitor,
}

/// Opaque handle for cancelling a running request from another thread.
pub struct FfiCancelHandle {
    pub(crate) inner: CancelHandle,
}

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
        }
    }
}

/// Lifecycle state as a C enum. Values match `HttpState`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpState {
    Ready = 0,
    Connecting = 1,
    SslHandshake = 2,
    Requesting = 3,
    Receiving = 4,
    Done = 5,
    Error = 6,
}

impl From<HttpState> for FfiHttpState {
    fn from(s: HttpState) -> Self {
        match s {
            HttpState::Ready => FfiHttpState::Ready,
            HttpState::Connecting => FfiHttpState::Connecting,
            HttpState::SslHandshake => FfiHttpState::SslHandshake,
            HttpState::Requesting => FfiHttpState::Requesting,
            HttpState::Receiving => FfiHttpState::Receiving,
            HttpState::Done => FfiHttpState::Done,
            HttpState::Error => FfiHttpState::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiFetchResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Configuration = 1,
    Connection = 2,
    Tls = 3,
    Transfer = 4,
    Protocol = 5,
    Cancelled = 6,
    Panic = 7,
    NullArg = 8,
}

impl From<ErrorKind> for FfiErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Configuration => FfiErrorCode::Configuration,
            ErrorKind::Connection => FfiErrorCode::Connection,
            ErrorKind::Tls => FfiErrorCode::Tls,
            ErrorKind::Transfer => FfiErrorCode::Transfer,
            ErrorKind::Protocol => FfiErrorCode::Protocol,
            ErrorKind::Cancelled => FfiErrorCode::Cancelled,
        }
    }
}

/// A finished response exposed to C.
///
/// `headers` holds `headers_len` NUL-terminated lines in arrival order,
/// status lines included. `body` holds `body_len` raw bytes and is not
/// NUL-terminated; it is null when the body is empty.
#[repr(C)]
pub struct FfiResponse {
    pub status: u16,
    pub headers: *mut *mut c_char,
    pub headers_len: usize,
    pub body: *mut u8,
    pub body_len: usize,
}

impl FfiResponse {
    fn from_core(response: Response) -> *mut Self {
        let status = response.status();
        let headers: Box<[*mut c_char]> = response.headers().iter().map(|h| c_string(h)).collect();
        let headers_len = headers.len();
        let headers = if headers.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(headers) as *mut *mut c_char
        };

        let body = response.into_body().into_boxed_slice();
        let body_len = body.len();
        let body = if body.is_empty() {
            std::ptr::null_mut()
        } else {
            Box::into_raw(body) as *mut u8
        };

        Box::into_raw(Box::new(FfiResponse {
            status,
            headers,
            headers_len,
            body,
            body_len,
        }))
    }

    /// Release a response built by `from_core`, fields included.
    ///
    /// # Safety
    /// `response` must come from `from_core` and not have been freed.
    pub(crate) unsafe fn free(response: *mut Self) {
        let response = unsafe { Box::from_raw(response) };
        if !response.headers.is_null() {
            let len = response.headers_len;
            let headers = unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(response.headers, len)) };
            for line in headers.iter() {
                if !line.is_null() {
                    drop(unsafe { CString::from_raw(*line) });
                }
            }
        }
        if !response.body.is_null() {
            drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(response.body, response.body_len)) });
        }
    }
}

/// Result envelope for `fetch_request_execute`.
///
/// On success `error_code` is `Ok`, `error_message` is null and `response`
/// points to the finished response. On failure `error_code` describes the
/// category, `error_message` is a human-readable C string and `response`
/// is null.
#[repr(C)]
pub struct FfiFetchResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub response: *mut FfiResponse,
}

impl FfiFetchResult {
    pub(crate) fn ok(response: Response) -> *mut Self {
        Box::into_raw(Box::new(FfiFetchResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            response: FfiResponse::from_core(response),
        }))
    }

    pub(crate) fn from_error(err: HttpError) -> *mut Self {
        Self::failure(err.kind().into(), &err.to_string())
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg)
    }

    fn failure(error_code: FfiErrorCode, msg: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiFetchResult {
            error_code,
            error_message: c_string(msg),
            response: std::ptr::null_mut(),
        }))
    }
}

/// Heap-allocate `s` as a C string. Interior NULs would truncate the string
/// on the C side, so they are dropped.
pub(crate) fn c_string(s: &str) -> *mut c_char {
    let cleaned = if s.contains('\0') { s.replace('\0', "") } else { s.to_string() };
    CString::new(cleaned).unwrap_or_default().into_raw()
}
