//! Error types for the transport and protocol layers.
//!
//! # Design
//! Two families mirror the two layers. `TransportError` covers everything a
//! byte stream can do wrong; `HttpClientError` covers request validation,
//! response parsing, and construction. Both are plain `Copy` codes so the
//! C ABI can forward them as integers without carrying strings around.
//!
//! `ConnectionClosed` is distinct from `SocketReadFailure`: the protocol
//! engine treats it as the end-of-message signal when a response has no
//! `Content-Length`.

use std::io;

/// Failures raised by a `Transport` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Host name resolution failed or produced no addresses.
    #[error("dns resolution failed")]
    DnsFailure,

    /// The local socket could not be created (fd or memory exhaustion).
    #[error("socket creation failed")]
    SocketCreateFailure,

    /// Every candidate address refused or was unreachable.
    #[error("socket connect failed")]
    SocketConnectFailure,

    #[error("socket write failed")]
    SocketWriteFailure,

    #[error("socket read failed")]
    SocketReadFailure,

    /// The peer closed the stream (EOF, reset, or broken pipe).
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("socket close failed")]
    SocketCloseFailure,

    #[error("transport initialisation failed")]
    InitFailure,
}

/// Failures raised by the protocol engine and the client façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HttpClientError {
    #[error("url parse failed")]
    UrlParseFailure,

    /// The response violated HTTP/1.1 framing, or the buffer could not grow.
    #[error("http response parse failed")]
    HttpParseFailure,

    /// The request broke a GET/POST shape rule; nothing was sent.
    #[error("invalid request")]
    InvalidRequest,

    #[error("client initialisation failed")]
    InitFailure,
}

/// Top-level error returned by every fallible operation in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("http error: {0}")]
    Http(#[from] HttpClientError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::Transport(TransportError::ConnectionClosed))
    }
}

impl TransportError {
    /// Classify an I/O error raised by a stream call.
    ///
    /// Peer-gone kinds always become `ConnectionClosed`; anything else falls
    /// back to `otherwise`, which names the operation that failed.
    pub fn from_io(err: &io::Error, otherwise: TransportError) -> TransportError {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportError::ConnectionClosed,
            _ => otherwise,
        }
    }
}
