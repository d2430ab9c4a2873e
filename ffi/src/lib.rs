//! C-ABI wrapper around `fetch-core`.
//!
//! # Overview
//! Exposes `Request` through `extern "C"` functions so any language with a
//! C FFI can configure a request, execute it, and poll its progress from a
//! second thread without linking to Rust's TLS stack directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Setters mirror `Request` 1:1 and return `false` on a null or non-UTF-8
//!   argument instead of silently doing nothing.
//! - `fetch_request_execute` returns a single `FfiFetchResult` envelope that
//!   carries either the response or a categorised error.
//! - Monitor and cancel handles are independent allocations, so another
//!   thread can hold them while the owning thread is blocked in execute.
//!
//! # Threading
//! A request handle belongs to one thread at a time. While
//! `fetch_request_execute` runs, no other `fetch_request_*` function may be
//! given the same handle, the progress getters included. Poll progress
//! through a monitor (`fetch_request_monitor`) and stop the call through a
//! cancel handle (`fetch_request_cancel_handle`), both created beforehand.
//! - The C caller owns all returned pointers and must call the matching
//!   `fetch_*_free` function to release them.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::catch_unwind;
use std::time::Duration;

use fetch_core::{RequestConfig, TransportOptions};

use types::*;

/// Borrow a C string as `&str`. `None` for null or invalid UTF-8.
fn read_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

fn millis(ms: u64) -> Option<Duration> {
    (ms != 0).then(|| Duration::from_millis(ms))
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Create an empty request: GET, port 80, default agent, no proxy.
///
/// The caller must free the returned pointer with `fetch_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_new() -> *mut FfiRequest {
    catch_unwind(|| {
        Box::into_raw(Box::new(FfiRequest {
            inner: fetch_core::Request::new(),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a request for `host` and `path`.
///
/// Returns null if either argument is null or not UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_with_target(host: *const c_char, path: *const c_char) -> *mut FfiRequest {
    catch_unwind(|| {
        let (Some(host), Some(path)) = (read_str(host), read_str(path)) else {
            return std::ptr::null_mut();
        };
        Box::into_raw(Box::new(FfiRequest {
            inner: fetch_core::Request::with_target(host, path),
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a request from a JSON `RequestConfig` document.
///
/// Returns null if `json` is null or does not describe a valid config.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_from_json(json: *const c_char) -> *mut FfiRequest {
    catch_unwind(|| {
        let Some(json) = read_str(json) else {
            return std::ptr::null_mut();
        };
        match RequestConfig::from_json(json) {
            Ok(config) => Box::into_raw(Box::new(FfiRequest {
                inner: fetch_core::Request::from_config(&config),
            })),
            Err(e) => {
                log::warn!("rejecting request config: {e}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a request. Safe to call with null.
///
/// Must not be called while another thread is inside
/// `fetch_request_execute` for the same request.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_free(req: *mut FfiRequest) {
    if !req.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(req) });
        });
    }
}

// ---------------------------------------------------------------------------
// Setters
// ---------------------------------------------------------------------------

/// Apply `f` to the request behind `req` with one string argument.
fn with_str(req: *mut FfiRequest, value: *const c_char, f: fn(&mut fetch_core::Request, &str)) -> bool {
    catch_unwind(|| {
        if req.is_null() {
            return false;
        }
        let Some(value) = read_str(value) else {
            return false;
        };
        f(&mut unsafe { &mut *req }.inner, value);
        true
    })
    .unwrap_or(false)
}

#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_host(req: *mut FfiRequest, host: *const c_char) -> bool {
    with_str(req, host, fetch_core::Request::set_host)
}

#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_path(req: *mut FfiRequest, path: *const c_char) -> bool {
    with_str(req, path, fetch_core::Request::set_path)
}

/// Set the User-Agent. An empty string sends no User-Agent header.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_agent(req: *mut FfiRequest, agent: *const c_char) -> bool {
    with_str(req, agent, fetch_core::Request::set_agent)
}

/// Append a raw header line such as `Authorization: Basic ...`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_add_header(req: *mut FfiRequest, header: *const c_char) -> bool {
    with_str(req, header, fetch_core::Request::add_header)
}

#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_port(req: *mut FfiRequest, port: u16) -> bool {
    catch_unwind(|| {
        if req.is_null() {
            return false;
        }
        unsafe { &mut *req }.inner.set_port(port);
        true
    })
    .unwrap_or(false)
}

/// Set the method and payload. `data` may be null when `len` is zero; the
/// payload is copied.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_data(
    req: *mut FfiRequest,
    method: FfiHttpMethod,
    data: *const u8,
    len: usize,
) -> bool {
    catch_unwind(|| {
        if req.is_null() || (data.is_null() && len > 0) {
            return false;
        }
        let payload: &[u8] = if len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }
        };
        unsafe { &mut *req }.inner.set_data(method.into(), payload);
        true
    })
    .unwrap_or(false)
}

/// Route the request through `host:port`. A null `host` clears the proxy.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_proxy(req: *mut FfiRequest, host: *const c_char, port: u16) -> bool {
    catch_unwind(|| {
        if req.is_null() {
            return false;
        }
        let req = unsafe { &mut *req };
        if host.is_null() {
            req.inner.clear_proxy();
            return true;
        }
        match read_str(host) {
            Some(host) => {
                req.inner.set_proxy(host, port);
                true
            }
            None => false,
        }
    })
    .unwrap_or(false)
}

#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_use_ssl(req: *mut FfiRequest, use_ssl: bool) -> bool {
    catch_unwind(|| {
        if req.is_null() {
            return false;
        }
        unsafe { &mut *req }.inner.set_use_ssl(use_ssl);
        true
    })
    .unwrap_or(false)
}

/// Set connect and I/O timeouts in milliseconds. Zero means no timeout.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_set_timeouts(req: *mut FfiRequest, connect_ms: u64, io_ms: u64) -> bool {
    catch_unwind(|| {
        if req.is_null() {
            return false;
        }
        let req = unsafe { &mut *req };
        let options = TransportOptions {
            connect_timeout: millis(connect_ms),
            io_timeout: millis(io_ms),
            ..req.inner.options().clone()
        };
        req.inner.set_options(options);
        true
    })
    .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Execution and progress
// ---------------------------------------------------------------------------

/// Perform the request, blocking until it completes.
///
/// Always returns a result; free it with `fetch_free_result`. The request
/// is borrowed exclusively for the whole call: other threads must use a
/// monitor or cancel handle created before the call, never `req` itself.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_execute(req: *mut FfiRequest) -> *mut FfiFetchResult {
    catch_unwind(|| {
        if req.is_null() {
            return FfiFetchResult::null_arg("req");
        }
        let req = unsafe { &mut *req };
        match req.inner.execute() {
            Ok(response) => FfiFetchResult::ok(response),
            Err(e) => FfiFetchResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiFetchResult::panic("panic in fetch_request_execute"))
}

/// Body bytes received by the last call. Zero for null.
///
/// Must not be called while `fetch_request_execute` runs on `req`; use
/// `fetch_monitor_bytes_read` from other threads.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_bytes_read(req: *const FfiRequest) -> usize {
    catch_unwind(|| {
        if req.is_null() {
            return 0;
        }
        unsafe { &*req }.inner.bytes_read()
    })
    .unwrap_or(0)
}

/// Advertised body size of the last call; zero when unknown.
///
/// Must not be called while `fetch_request_execute` runs on `req`; use
/// `fetch_monitor_bytes_total` from other threads.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_bytes_total(req: *const FfiRequest) -> usize {
    catch_unwind(|| {
        if req.is_null() {
            return 0;
        }
        unsafe { &*req }.inner.bytes_total()
    })
    .unwrap_or(0)
}

/// State after the last call, or `Ready` before the first one.
///
/// Must not be called while `fetch_request_execute` runs on `req`; use
/// `fetch_monitor_state` from other threads.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_state(req: *const FfiRequest) -> FfiHttpState {
    catch_unwind(|| {
        if req.is_null() {
            return FfiHttpState::Ready;
        }
        unsafe { &*req }.inner.state().into()
    })
    .unwrap_or(FfiHttpState::Error)
}

/// Create a progress monitor that stays valid independently of `req`.
/// Create it before `fetch_request_execute`; its getters may then be called
/// from any thread while the request runs.
///
/// Free it with `fetch_monitor_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_monitor(req: *const FfiRequest) -> *mut FfiMonitor {
    catch_unwind(|| {
        if req.is_null() {
            return std::ptr::null_mut();
        }
        let inner = unsafe { &*req }.inner.monitor();
        Box::into_raw(Box::new(FfiMonitor { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn fetch_monitor_bytes_read(monitor: *const FfiMonitor) -> usize {
    catch_unwind(|| {
        if monitor.is_null() {
            return 0;
        }
        unsafe { &*monitor }.inner.bytes_read()
    })
    .unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn fetch_monitor_bytes_total(monitor: *const FfiMonitor) -> usize {
    catch_unwind(|| {
        if monitor.is_null() {
            return 0;
        }
        unsafe { &*monitor }.inner.bytes_total()
    })
    .unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn fetch_monitor_state(monitor: *const FfiMonitor) -> FfiHttpState {
    catch_unwind(|| {
        if monitor.is_null() {
            return FfiHttpState::Ready;
        }
        unsafe { &*monitor }.inner.state().into()
    })
    .unwrap_or(FfiHttpState::Error)
}

/// Free a monitor. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_monitor_free(monitor: *mut FfiMonitor) {
    if !monitor.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(monitor) });
        });
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Create a cancel handle that stays valid independently of `req`.
/// Create it before `fetch_request_execute` to cancel from another thread.
///
/// Free it with `fetch_cancel_handle_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_request_cancel_handle(req: *const FfiRequest) -> *mut FfiCancelHandle {
    catch_unwind(|| {
        if req.is_null() {
            return std::ptr::null_mut();
        }
        let inner = unsafe { &*req }.inner.cancel_handle();
        Box::into_raw(Box::new(FfiCancelHandle { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Ask the request to stop. A running call fails with `Cancelled` at its
/// next socket read or write, header line or body chunk. With no call
/// running, the next `fetch_request_execute` fails with `Cancelled` instead.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_cancel(handle: *const FfiCancelHandle) {
    if !handle.is_null() {
        let _ = catch_unwind(|| unsafe { &*handle }.inner.cancel());
    }
}

/// Free a cancel handle. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_cancel_handle_free(handle: *mut FfiCancelHandle) {
    if !handle.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(handle) });
        });
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiFetchResult` returned by `fetch_request_execute`, including
/// its message and response. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_free_result(result: *mut FfiFetchResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { std::ffi::CString::from_raw(result.error_message) });
        }
        if !result.response.is_null() {
            unsafe { FfiResponse::free(result.response) };
        }
    });
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
