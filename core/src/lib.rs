//! Minimal blocking HTTP/1.1 client over TCP and Unix-domain sockets.
//!
//! # Overview
//! Three layers, each depending only on the one below:
//! - `HttpClient` validates GET/POST request shape and delegates.
//! - `Http1Protocol` serializes requests into a reused `GrowableBuffer`,
//!   writes them, and parses responses with content-length or
//!   connection-close framing.
//! - `Transport` moves bytes; `TcpTransport` and `UnixTransport` wrap std
//!   sockets and `AnyTransport` chooses between them at runtime.
//!
//! # Design
//! - Responses come in two memory policies selected by `ResponseMode`:
//!   zero-copy views borrowing the engine buffer, or owned copies.
//! - Request bodies go out either appended to the head (`WriteMode::Copy`)
//!   or as a second segment of one gather-write (`WriteMode::Vectored`).
//! - Errors are small `Copy` codes in two families, so the C ABI can pass
//!   them across without allocation.
//! - No async runtime and no internal threads. One client is driven by one
//!   thread at a time.

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod tcp;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod transport;
pub mod unix;

pub use buffer::{AllocFailure, BufferAllocator, GrowableBuffer, SystemAllocator};
pub use client::HttpClient;
pub use config::{ClientConfig, ProtocolConfig, ResponseMode, TransportConfig, TransportKind, WriteMode};
pub use error::{Error, HttpClientError, Result, TransportError};
pub use http::{HttpHeader, HttpMethod, HttpRequest, HttpResponse, StatusCode};
pub use protocol::{Http1Protocol, HttpProtocol};
pub use tcp::TcpTransport;
pub use transport::{AnyTransport, Transport};
pub use unix::UnixTransport;
