//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible representations:
//! `*mut c_char` instead of `String`, pointer-and-length pairs instead of
//! `Vec`, and enums with explicit discriminants. Conversion functions live
//! here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use rawhttp_core::{
    Error, HttpClient, HttpClientError, HttpResponse, ResponseMode, TransportError, TransportKind,
    WriteMode,
};

/// Opaque handle to an `HttpClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiHttpClient {
    pub(crate) inner: HttpClient,
}

// ---------------------------------------------------------------------------
// Construction enums
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiTransportKind {
    Tcp = 0,
    Unix = 1,
}

impl From<FfiTransportKind> for TransportKind {
    fn from(kind: FfiTransportKind) -> Self {
        match kind {
            FfiTransportKind::Tcp => TransportKind::Tcp,
            FfiTransportKind::Unix => TransportKind::Unix,
        }
    }
}

/// Memory policy for response bodies.
///
/// With `ZeroCopy` the body pointer of a result aliases the client's
/// internal buffer and stays valid only until the next request on the same
/// client. With `Owning` the body is a separate allocation released by
/// `rawhttp_result_free`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResponseMode {
    Owning = 0,
    ZeroCopy = 1,
}

impl From<FfiResponseMode> for ResponseMode {
    fn from(mode: FfiResponseMode) -> Self {
        match mode {
            FfiResponseMode::Owning => ResponseMode::Owning,
            FfiResponseMode::ZeroCopy => ResponseMode::ZeroCopy,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiWriteMode {
    Copy = 0,
    Vectored = 1,
}

impl From<FfiWriteMode> for WriteMode {
    fn from(mode: FfiWriteMode) -> Self {
        match mode {
            FfiWriteMode::Copy => WriteMode::Copy,
            FfiWriteMode::Vectored => WriteMode::Vectored,
        }
    }
}

// ---------------------------------------------------------------------------
// Request input (caller-owned, never freed here)
// ---------------------------------------------------------------------------

/// A request header supplied by the caller as two NUL-terminated strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes. Transport failures occupy 1..=8, protocol and validation
/// failures 20..=23, and FFI-level failures 30 and up.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    DnsFailure = 1,
    SocketCreateFailure = 2,
    SocketConnectFailure = 3,
    SocketWriteFailure = 4,
    SocketReadFailure = 5,
    ConnectionClosed = 6,
    SocketCloseFailure = 7,
    TransportInitFailure = 8,
    UrlParseFailure = 20,
    HttpParseFailure = 21,
    InvalidRequest = 22,
    InitFailure = 23,
    NullArg = 30,
    InvalidArg = 31,
    Panic = 32,
}

impl From<Error> for FfiErrorCode {
    fn from(err: Error) -> Self {
        match err {
            Error::Transport(e) => match e {
                TransportError::DnsFailure => FfiErrorCode::DnsFailure,
                TransportError::SocketCreateFailure => FfiErrorCode::SocketCreateFailure,
                TransportError::SocketConnectFailure => FfiErrorCode::SocketConnectFailure,
                TransportError::SocketWriteFailure => FfiErrorCode::SocketWriteFailure,
                TransportError::SocketReadFailure => FfiErrorCode::SocketReadFailure,
                TransportError::ConnectionClosed => FfiErrorCode::ConnectionClosed,
                TransportError::SocketCloseFailure => FfiErrorCode::SocketCloseFailure,
                TransportError::InitFailure => FfiErrorCode::TransportInitFailure,
            },
            Error::Http(e) => match e {
                HttpClientError::UrlParseFailure => FfiErrorCode::UrlParseFailure,
                HttpClientError::HttpParseFailure => FfiErrorCode::HttpParseFailure,
                HttpClientError::InvalidRequest => FfiErrorCode::InvalidRequest,
                HttpClientError::InitFailure => FfiErrorCode::InitFailure,
            },
        }
    }
}

impl FfiErrorCode {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            FfiErrorCode::Ok => "ok",
            FfiErrorCode::DnsFailure => "dns resolution failed",
            FfiErrorCode::SocketCreateFailure => "socket creation failed",
            FfiErrorCode::SocketConnectFailure => "socket connect failed",
            FfiErrorCode::SocketWriteFailure => "socket write failed",
            FfiErrorCode::SocketReadFailure => "socket read failed",
            FfiErrorCode::ConnectionClosed => "connection closed by peer",
            FfiErrorCode::SocketCloseFailure => "socket close failed",
            FfiErrorCode::TransportInitFailure => "transport initialisation failed",
            FfiErrorCode::UrlParseFailure => "url parse failed",
            FfiErrorCode::HttpParseFailure => "http response parse failed",
            FfiErrorCode::InvalidRequest => "invalid request",
            FfiErrorCode::InitFailure => "client initialisation failed",
            FfiErrorCode::NullArg => "null argument",
            FfiErrorCode::InvalidArg => "argument is not valid utf-8",
            FfiErrorCode::Panic => "internal panic",
        }
    }
}

/// A response header owned by the library.
#[repr(C)]
pub struct FfiResponseHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// A parsed response.
///
/// `status_message` and the header strings are always owned copies. `body`
/// is owned unless `body_borrowed` is set (zero-copy clients), in which case
/// it points into the client and must not be used after the next request.
/// An empty body is a null pointer with `body_len` 0.
#[repr(C)]
pub struct FfiResponse {
    pub status_code: u16,
    pub status_message: *mut c_char,
    pub headers: *mut FfiResponseHeader,
    pub headers_len: u32,
    pub body: *const u8,
    pub body_len: usize,
    pub body_borrowed: bool,
    /// Declared `Content-Length`, or -1 when the body was framed by close.
    pub content_length: i64,
}

impl FfiResponse {
    /// Convert a core response. Fails with `HttpParseFailure` if any text
    /// field holds an interior NUL and so has no C-string form.
    pub(crate) fn from_core(res: HttpResponse<'_>) -> Result<*mut Self, FfiErrorCode> {
        let has_nul = res.status_message.contains('\0')
            || res
                .headers
                .iter()
                .any(|h| h.key.contains('\0') || h.value.contains('\0'));
        if has_nul {
            return Err(FfiErrorCode::HttpParseFailure);
        }

        let status_message = c_string(&res.status_message);
        let headers_len = res.headers.len() as u32;
        let headers = if res.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiResponseHeader]> = res
                .headers
                .iter()
                .map(|h| FfiResponseHeader {
                    key: c_string(&h.key),
                    value: c_string(&h.value),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiResponseHeader
        };

        let body_borrowed = res.is_borrowed();
        let body_len = res.body.len();
        let body = if body_len == 0 {
            std::ptr::null()
        } else if body_borrowed {
            res.body.as_ptr()
        } else {
            let owned: Box<[u8]> = res.body.into_owned().into_boxed_slice();
            Box::into_raw(owned) as *const u8
        };

        let content_length = res
            .content_length
            .and_then(|len| i64::try_from(len).ok())
            .unwrap_or(-1);

        Ok(Box::into_raw(Box::new(FfiResponse {
            status_code: res.status_code.as_u16(),
            status_message,
            headers,
            headers_len,
            body,
            body_len,
            body_borrowed,
            content_length,
        })))
    }

    /// Release everything `from_core` allocated.
    ///
    /// # Safety
    /// `response` must come from `from_core` and not have been freed.
    pub(crate) unsafe fn free(response: *mut FfiResponse) {
        let response = unsafe { Box::from_raw(response) };
        if !response.status_message.is_null() {
            drop(unsafe { CString::from_raw(response.status_message) });
        }
        if !response.headers.is_null() && response.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    response.headers,
                    response.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                drop(unsafe { CString::from_raw(h.key) });
                drop(unsafe { CString::from_raw(h.value) });
            }
        }
        if !response.body_borrowed && !response.body.is_null() {
            drop(unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    response.body as *mut u8,
                    response.body_len,
                ))
            });
        }
    }
}

/// Result envelope for `rawhttp_client_get` / `rawhttp_client_post`.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `response`
/// is non-null. On failure `error_message` is a human-readable C string and
/// `response` is null.
#[repr(C)]
pub struct FfiResponseResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub response: *mut FfiResponse,
}

impl FfiResponseResult {
    pub(crate) fn ok(response: *mut FfiResponse) -> *mut Self {
        Box::into_raw(Box::new(FfiResponseResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            response,
        }))
    }

    pub(crate) fn error(code: FfiErrorCode) -> *mut Self {
        Self::error_with(code, code.describe())
    }

    pub(crate) fn error_with(code: FfiErrorCode, msg: &str) -> *mut Self {
        Box::into_raw(Box::new(FfiResponseResult {
            error_code: code,
            error_message: CString::new(msg).unwrap_or_default().into_raw(),
            response: std::ptr::null_mut(),
        }))
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error_with(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error_with(FfiErrorCode::Panic, msg)
    }
}

/// NUL-free text to an owned C string. Callers check for interior NULs.
fn c_string(s: &str) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}
