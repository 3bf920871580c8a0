//! Byte-stream transport abstraction.
//!
//! # Design
//! `Transport` knows nothing about HTTP. The protocol engine is generic over
//! it, which is the seam tests use to substitute scripted or fault-injecting
//! streams. Two socket-backed implementations live in `tcp` and `unix`;
//! `AnyTransport` picks one of them at runtime.
//!
//! Contract every implementation must honor:
//! - `read` returning zero bytes into a non-empty buffer is reported as
//!   `ConnectionClosed`, never as `Ok(0)`.
//! - `close` is idempotent.
//! - Calls on a transport that is not connected fail with
//!   `SocketReadFailure` (read) or `SocketWriteFailure` (write).

use std::io::{self, IoSlice, Read, Write};

use crate::config::{TransportConfig, TransportKind};
use crate::error::{Result, TransportError};
use crate::tcp::TcpTransport;
use crate::unix::UnixTransport;

pub trait Transport {
    /// Open the stream. `host` is a host name or address for TCP and a
    /// filesystem path for Unix sockets, which ignore `port`.
    fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Gather-write `bufs` in one call. Returns how many bytes were accepted,
    /// which may be fewer than the total.
    ///
    /// The default writes each segment in turn and stops at the first short
    /// write, for transports without a native scatter-gather call.
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> Result<usize> {
        let mut total = 0;
        for buf in bufs.iter().filter(|b| !b.is_empty()) {
            let n = self.write(buf)?;
            total += n;
            if n < buf.len() {
                break;
            }
        }
        Ok(total)
    }

    fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// Write all of `buf`, continuing after short writes.
pub fn write_all<T: Transport + ?Sized>(transport: &mut T, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let n = transport.write(buf)?;
        if n == 0 {
            return Err(TransportError::SocketWriteFailure.into());
        }
        buf = &buf[n..];
    }
    Ok(())
}

/// Write every segment of `bufs`, continuing after short vectored writes.
pub fn write_all_vectored<T: Transport + ?Sized>(
    transport: &mut T,
    mut bufs: &mut [IoSlice<'_>],
) -> Result<()> {
    IoSlice::advance_slices(&mut bufs, 0);
    while !bufs.is_empty() {
        let n = transport.write_vectored(bufs)?;
        if n == 0 {
            return Err(TransportError::SocketWriteFailure.into());
        }
        IoSlice::advance_slices(&mut bufs, n);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared std-stream plumbing for the socket transports
// ---------------------------------------------------------------------------

pub(crate) fn stream_read<S: Read>(stream: Option<&mut S>, buf: &mut [u8]) -> Result<usize> {
    let stream = stream.ok_or(TransportError::SocketReadFailure)?;
    loop {
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => return Err(TransportError::ConnectionClosed.into()),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TransportError::from_io(&e, TransportError::SocketReadFailure).into())
            }
        }
    }
}

pub(crate) fn stream_write<S: Write>(stream: Option<&mut S>, buf: &[u8]) -> Result<usize> {
    let stream = stream.ok_or(TransportError::SocketWriteFailure)?;
    loop {
        match stream.write(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TransportError::from_io(&e, TransportError::SocketWriteFailure).into())
            }
        }
    }
}

pub(crate) fn stream_write_vectored<S: Write>(
    stream: Option<&mut S>,
    bufs: &[IoSlice<'_>],
) -> Result<usize> {
    let stream = stream.ok_or(TransportError::SocketWriteFailure)?;
    loop {
        match stream.write_vectored(bufs) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TransportError::from_io(&e, TransportError::SocketWriteFailure).into())
            }
        }
    }
}

/// Map a `shutdown` failure. A peer that is already gone counts as closed.
pub(crate) fn shutdown_result(result: io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        Err(_) => Err(TransportError::SocketCloseFailure.into()),
    }
}

/// Classify a connect-time error that is not about the remote end.
pub(crate) fn is_local_exhaustion(err: &io::Error) -> bool {
    // EMFILE / ENFILE / ENOBUFS share these values on Linux; macOS uses 55
    // for ENOBUFS.
    const EMFILE: i32 = 24;
    const ENFILE: i32 = 23;
    #[cfg(target_os = "linux")]
    const ENOBUFS: i32 = 105;
    #[cfg(not(target_os = "linux"))]
    const ENOBUFS: i32 = 55;

    err.kind() == io::ErrorKind::OutOfMemory
        || matches!(err.raw_os_error(), Some(EMFILE | ENFILE | ENOBUFS))
}

// ---------------------------------------------------------------------------
// Runtime-selected transport
// ---------------------------------------------------------------------------

/// A socket transport chosen at runtime from `TransportKind`.
#[derive(Debug)]
pub enum AnyTransport {
    Tcp(TcpTransport),
    Unix(UnixTransport),
}

impl AnyTransport {
    pub fn new(kind: TransportKind, options: TransportConfig) -> Self {
        match kind {
            TransportKind::Tcp => AnyTransport::Tcp(TcpTransport::with_config(options)),
            TransportKind::Unix => AnyTransport::Unix(UnixTransport::with_config(options)),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            AnyTransport::Tcp(_) => TransportKind::Tcp,
            AnyTransport::Unix(_) => TransportKind::Unix,
        }
    }
}

impl Transport for AnyTransport {
    fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        match self {
            AnyTransport::Tcp(t) => t.connect(host, port),
            AnyTransport::Unix(t) => t.connect(host, port),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            AnyTransport::Tcp(t) => t.read(buf),
            AnyTransport::Unix(t) => t.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            AnyTransport::Tcp(t) => t.write(buf),
            AnyTransport::Unix(t) => t.write(buf),
        }
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> Result<usize> {
        match self {
            AnyTransport::Tcp(t) => t.write_vectored(bufs),
            AnyTransport::Unix(t) => t.write_vectored(bufs),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self {
            AnyTransport::Tcp(t) => t.close(),
            AnyTransport::Unix(t) => t.close(),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            AnyTransport::Tcp(t) => t.is_connected(),
            AnyTransport::Unix(t) => t.is_connected(),
        }
    }
}
