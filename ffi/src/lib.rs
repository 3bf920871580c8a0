//! C-ABI wrapper around `rawhttp-core`.
//!
//! # Overview
//! Exposes the HTTP/1.1 client façade through `extern "C"` functions:
//! create a client, connect it to a TCP host or a Unix socket path, issue
//! GET/POST requests, and read back status, headers, and body.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Requests are described by borrowed caller memory (C strings, header
//!   arrays, body bytes); nothing the caller passes in is freed here.
//! - Responses come back in a single `FfiResponseResult` envelope. The
//!   caller owns it and must release it with `rawhttp_result_free`.
//! - Zero-copy clients hand out a body pointer into the client's buffer.
//!   It is valid until the next request on that client; the result can be
//!   freed at any time without touching it.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rawhttp_core::{ClientConfig, HttpClient, HttpHeader, HttpRequest, ProtocolConfig};

use types::*;

/// Borrow a C string as UTF-8.
///
/// # Safety
/// `ptr` must be non-null and point to a NUL-terminated string that outlives
/// the returned reference.
unsafe fn borrow_str<'a>(ptr: *const c_char) -> Result<&'a str, FfiErrorCode> {
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiErrorCode::InvalidArg)
}

/// Borrow a caller header array as core headers.
///
/// # Safety
/// When non-null, `headers` must point to `headers_len` valid `FfiHeader`s.
unsafe fn borrow_headers<'a>(
    headers: *const FfiHeader,
    headers_len: u32,
) -> Result<Vec<HttpHeader<'a>>, FfiErrorCode> {
    if headers_len == 0 {
        return Ok(Vec::new());
    }
    if headers.is_null() {
        return Err(FfiErrorCode::NullArg);
    }
    let raw = unsafe { std::slice::from_raw_parts(headers, headers_len as usize) };
    raw.iter()
        .map(|h| {
            if h.key.is_null() || h.value.is_null() {
                return Err(FfiErrorCode::NullArg);
            }
            let key = unsafe { borrow_str(h.key) }?;
            let value = unsafe { borrow_str(h.value) }?;
            Ok(HttpHeader::new(key, value))
        })
        .collect()
}

fn into_result(outcome: rawhttp_core::Result<rawhttp_core::HttpResponse<'_>>) -> *mut FfiResponseResult {
    match outcome {
        Ok(res) => match FfiResponse::from_core(res) {
            Ok(response) => FfiResponseResult::ok(response),
            Err(code) => FfiResponseResult::error(code),
        },
        Err(err) => FfiResponseResult::error_with(err.into(), &err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client with default buffer capacity and no timeouts.
///
/// The caller must free the returned pointer with `rawhttp_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_client_new(
    transport_kind: FfiTransportKind,
    response_mode: FfiResponseMode,
    write_mode: FfiWriteMode,
) -> *mut FfiHttpClient {
    catch_unwind(|| {
        let config = ClientConfig {
            transport: transport_kind.into(),
            protocol: ProtocolConfig {
                response_mode: response_mode.into(),
                write_mode: write_mode.into(),
                ..ProtocolConfig::default()
            },
            ..ClientConfig::default()
        };
        match HttpClient::from_config(&config) {
            Ok(client) => Box::into_raw(Box::new(FfiHttpClient { inner: client })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a client from a JSON `ClientConfig` document.
///
/// Returns null if `config_json` is null, not UTF-8, or not a valid
/// configuration.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_client_new_from_json(config_json: *const c_char) -> *mut FfiHttpClient {
    catch_unwind(|| {
        if config_json.is_null() {
            return std::ptr::null_mut();
        }
        let Ok(raw) = (unsafe { borrow_str(config_json) }) else {
            return std::ptr::null_mut();
        };
        ClientConfig::from_json(raw)
            .and_then(|config| HttpClient::from_config(&config))
            .map(|client| Box::into_raw(Box::new(FfiHttpClient { inner: client })))
            .unwrap_or(std::ptr::null_mut())
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `rawhttp_client_new*`, closing its connection.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_client_free(client: *mut FfiHttpClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let mut client = unsafe { Box::from_raw(client) };
            let _ = client.inner.disconnect();
        }));
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Connect to `host:port`, or to the Unix socket path `host` (port ignored).
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_client_connect(
    client: *mut FfiHttpClient,
    host: *const c_char,
    port: u16,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() || host.is_null() {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &mut *client };
        let host = match unsafe { borrow_str(host) } {
            Ok(h) => h,
            Err(code) => return code,
        };
        match client.inner.connect(host, port) {
            Ok(()) => FfiErrorCode::Ok,
            Err(err) => err.into(),
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Close the connection. Closing an unconnected client succeeds.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_client_disconnect(client: *mut FfiHttpClient) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &mut *client };
        match client.inner.disconnect() {
            Ok(()) => FfiErrorCode::Ok,
            Err(err) => err.into(),
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Send a GET for `path` with `headers_len` caller headers.
///
/// Never returns null. Free the result with `rawhttp_result_free`.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_client_get(
    client: *mut FfiHttpClient,
    path: *const c_char,
    headers: *const FfiHeader,
    headers_len: u32,
) -> *mut FfiResponseResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResponseResult::null_arg("client");
        }
        if path.is_null() {
            return FfiResponseResult::null_arg("path");
        }
        let client = unsafe { &mut *client };
        let path = match unsafe { borrow_str(path) } {
            Ok(p) => p,
            Err(code) => return FfiResponseResult::error(code),
        };
        let headers = match unsafe { borrow_headers(headers, headers_len) } {
            Ok(h) => h,
            Err(code) => return FfiResponseResult::error(code),
        };

        let mut request = HttpRequest::get(path);
        request.headers = headers;
        into_result(client.inner.get(request))
    }))
    .unwrap_or_else(|_| FfiResponseResult::panic("panic in rawhttp_client_get"))
}

/// Send a POST of `body_len` bytes at `body`. The headers must include a
/// `Content-Length`.
///
/// Never returns null. Free the result with `rawhttp_result_free`.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_client_post(
    client: *mut FfiHttpClient,
    path: *const c_char,
    headers: *const FfiHeader,
    headers_len: u32,
    body: *const u8,
    body_len: usize,
) -> *mut FfiResponseResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResponseResult::null_arg("client");
        }
        if path.is_null() {
            return FfiResponseResult::null_arg("path");
        }
        if body.is_null() && body_len > 0 {
            return FfiResponseResult::null_arg("body");
        }
        let client = unsafe { &mut *client };
        let path = match unsafe { borrow_str(path) } {
            Ok(p) => p,
            Err(code) => return FfiResponseResult::error(code),
        };
        let headers = match unsafe { borrow_headers(headers, headers_len) } {
            Ok(h) => h,
            Err(code) => return FfiResponseResult::error(code),
        };
        let body: &[u8] = if body_len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(body, body_len) }
        };

        let mut request = HttpRequest::post(path, body);
        request.headers = headers;
        into_result(client.inner.post(request))
    }))
    .unwrap_or_else(|_| FfiResponseResult::panic("panic in rawhttp_client_post"))
}

// ---------------------------------------------------------------------------
// Free / helper functions
// ---------------------------------------------------------------------------

/// Free a result returned by `rawhttp_client_get` / `rawhttp_client_post`.
/// A borrowed (zero-copy) body is left alone. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_result_free(result: *mut FfiResponseResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.response.is_null() {
            unsafe { FfiResponse::free(result.response) };
        }
    });
}

/// Describe an error code. Free the returned string with
/// `rawhttp_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_error_string(code: FfiErrorCode) -> *mut c_char {
    catch_unwind(|| CString::new(code.describe()).unwrap_or_default().into_raw())
        .unwrap_or(std::ptr::null_mut())
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn rawhttp_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
