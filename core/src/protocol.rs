//! HTTP/1.1 protocol engine.
//!
//! # Overview
//! `Http1Protocol` owns one `Transport` and one `GrowableBuffer`. Each
//! request cycle reuses the buffer: the request head is serialized into it,
//! written out, then the buffer is reset and refilled with the response.
//!
//! # Design
//! - The read loop is a small state machine: `AwaitingHeaders` until the
//!   `\r\n\r\n` terminator shows up, then `HeadersParsed` until the body is
//!   framed. Framing is `Content-Length` when declared, otherwise
//!   read-until-close.
//! - The parser records `Span` offsets, never slices or addresses, because
//!   a read can grow (and move) the buffer after the headers were parsed.
//!   Offsets are turned into slices only in `present`, once all reads for
//!   the response are done.
//! - One parse feeds both memory policies. `present` builds a borrowed view;
//!   owning mode deep-copies that view before returning.

use std::borrow::Cow;
use std::io::IoSlice;

use memchr::{memchr, memmem};
use tracing::{debug, trace, warn};

use crate::buffer::{AllocFailure, BufferAllocator, GrowableBuffer, SystemAllocator};
use crate::config::{ProtocolConfig, ResponseMode, WriteMode};
use crate::error::{Error, HttpClientError, Result, TransportError};
use crate::http::{HttpHeader, HttpMethod, HttpRequest, HttpResponse, StatusCode};
use crate::transport::{self, Transport};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";

/// Smallest spare tail offered to a single `read`.
const MIN_READ_SPARE: usize = 512;

/// Lower-level interface the client façade drives.
pub trait HttpProtocol {
    fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    fn disconnect(&mut self) -> Result<()>;

    /// Send `request` and read its response. A zero-copy response borrows
    /// the engine until it is dropped or detached with `into_owned`.
    fn perform_request(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse<'_>>;

    /// `perform_request` with a response that owns its data, so the engine
    /// is free for the next request while it is held. Owning engines already
    /// build it that way; zero-copy engines pay one copy here.
    fn perform_request_owned(
        &mut self,
        request: &HttpRequest<'_>,
    ) -> Result<HttpResponse<'static>> {
        self.perform_request(request).map(HttpResponse::into_owned)
    }
}

/// Half-open byte range `[start, end)` into the engine buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn of<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.start..self.end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResponseHead {
    status_code: u16,
    status_message: Span,
    headers: Vec<(Span, Span)>,
    /// Status line, headers, and terminator.
    header_size: usize,
    content_length: Option<usize>,
}

impl ResponseHead {
    /// End offset of a length-framed body.
    fn body_end(&self) -> Option<usize> {
        self.content_length.map(|len| self.header_size + len)
    }
}

#[derive(Debug)]
enum ReadState {
    /// `scanned` bytes are known not to start a terminator.
    AwaitingHeaders { scanned: usize },
    HeadersParsed(ResponseHead),
}

/// A fully framed response sitting in the buffer.
#[derive(Debug)]
struct Framed {
    head: ResponseHead,
    body: Span,
}

fn parse_failure() -> Error {
    Error::Http(HttpClientError::HttpParseFailure)
}

fn grow_failed(err: AllocFailure) -> Error {
    warn!(requested = err.requested, "buffer growth failed");
    parse_failure()
}

#[derive(Debug)]
pub struct Http1Protocol<T: Transport> {
    transport: T,
    buffer: GrowableBuffer,
    config: ProtocolConfig,
}

impl<T: Transport + Default> Default for Http1Protocol<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Transport> Http1Protocol<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ProtocolConfig::default())
    }

    pub fn with_config(transport: T, config: ProtocolConfig) -> Self {
        Self::with_allocator(transport, config, Box::new(SystemAllocator))
    }

    /// Build an engine whose buffer grows through `allocator`.
    pub fn with_allocator(
        transport: T,
        config: ProtocolConfig,
        allocator: Box<dyn BufferAllocator>,
    ) -> Self {
        Self {
            buffer: GrowableBuffer::with_allocator(config.initial_buffer_capacity, allocator),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Base address of the internal buffer; zero-copy responses point here.
    pub fn buffer_as_ptr(&self) -> *const u8 {
        self.buffer.as_ptr()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    // --- Request ---

    fn serialize_head(&mut self, request: &HttpRequest<'_>) -> Result<()> {
        let buf = &mut self.buffer;
        buf.reset();

        let request_line: [&[u8]; 4] = [
            request.method.as_str().as_bytes(),
            b" ",
            request.path.as_bytes(),
            b" HTTP/1.1\r\n",
        ];
        for part in request_line {
            buf.append(part).map_err(grow_failed)?;
        }
        for header in &request.headers {
            for part in [header.key.as_bytes(), b": ", header.value.as_bytes(), CRLF] {
                buf.append(part).map_err(grow_failed)?;
            }
        }
        buf.append(CRLF).map_err(grow_failed)
    }

    /// Only POST carries a body on the wire; a GET body is never sent.
    fn send_request(&mut self, request: &HttpRequest<'_>) -> Result<()> {
        self.serialize_head(request)?;

        let body: &[u8] = match request.method {
            HttpMethod::Post => request.body,
            HttpMethod::Get => {
                if !request.body.is_empty() {
                    debug!(body = request.body.len(), "dropping body of GET request");
                }
                &[]
            }
        };

        if self.config.write_mode == WriteMode::Vectored && !body.is_empty() {
            let mut bufs = [IoSlice::new(self.buffer.as_slice()), IoSlice::new(body)];
            return transport::write_all_vectored(&mut self.transport, &mut bufs);
        }

        if !body.is_empty() {
            self.buffer.append(body).map_err(grow_failed)?;
        }
        transport::write_all(&mut self.transport, self.buffer.as_slice())
    }

    // --- Response ---

    fn read_response(&mut self) -> Result<Framed> {
        self.buffer.reset();
        let mut state = ReadState::AwaitingHeaders { scanned: 0 };

        loop {
            let spare = self.buffer.spare_mut(MIN_READ_SPARE).map_err(grow_failed)?;
            let n = match self.transport.read(spare) {
                Ok(n) => n,
                Err(e) if e.is_connection_closed() => return self.finish_at_close(state),
                Err(e) => return Err(e),
            };
            self.buffer.commit(n);
            let buffered = self.buffer.len();
            trace!(read = n, buffered, "response bytes");

            if let ReadState::AwaitingHeaders { scanned } = state {
                let buf = self.buffer.as_slice();
                match find_terminator(buf, scanned) {
                    Some(header_size) => {
                        let head = parse_head(&buf[..header_size])?;
                        state = ReadState::HeadersParsed(head);
                    }
                    None => {
                        state = ReadState::AwaitingHeaders { scanned: buffered };
                        continue;
                    }
                }
            }

            state = match state {
                ReadState::HeadersParsed(head)
                    if head.body_end().is_some_and(|end| buffered >= end) =>
                {
                    let body = Span {
                        start: head.header_size,
                        end: head.header_size + head.content_length.unwrap_or(0),
                    };
                    return Ok(Framed { head, body });
                }
                other => other,
            };
        }
    }

    /// The peer closed the stream. Only a read-until-close body is complete
    /// at this point.
    fn finish_at_close(&self, state: ReadState) -> Result<Framed> {
        let buffered = self.buffer.len();
        match state {
            ReadState::AwaitingHeaders { .. } if buffered == 0 => {
                debug!("connection closed before any response bytes");
                Err(TransportError::ConnectionClosed.into())
            }
            ReadState::AwaitingHeaders { .. } => {
                warn!(buffered, "connection closed before header terminator");
                Err(parse_failure())
            }
            ReadState::HeadersParsed(head) => match head.body_end() {
                Some(end) if buffered < end => {
                    warn!(
                        declared = head.content_length,
                        received = buffered - head.header_size,
                        "connection closed short of content-length"
                    );
                    Err(parse_failure())
                }
                Some(end) => {
                    let body = Span { start: head.header_size, end };
                    Ok(Framed { head, body })
                }
                None => {
                    let body = Span { start: head.header_size, end: buffered };
                    Ok(Framed { head, body })
                }
            },
        }
    }

    /// Materialize the framed response from the buffer as it is now, then
    /// apply the configured memory policy.
    fn present(&self, framed: &Framed) -> Result<HttpResponse<'_>> {
        let buf = self.buffer.as_slice();
        let head = &framed.head;

        let headers = head
            .headers
            .iter()
            .map(|(key, value)| {
                Ok(HttpHeader {
                    key: Cow::Borrowed(text(buf, *key)?),
                    value: Cow::Borrowed(text(buf, *value)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let view = HttpResponse {
            status_code: StatusCode(head.status_code),
            status_message: Cow::Borrowed(text(buf, head.status_message)?),
            headers,
            body: Cow::Borrowed(framed.body.of(buf)),
            content_length: head.content_length,
        };

        Ok(match self.config.response_mode {
            ResponseMode::ZeroCopy => view,
            ResponseMode::Owning => view.into_owned(),
        })
    }
}

impl<T: Transport> HttpProtocol for Http1Protocol<T> {
    fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.transport.connect(host, port)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.transport.close()
    }

    fn perform_request(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse<'_>> {
        debug!(method = %request.method, path = request.path, "sending request");
        self.send_request(request)?;
        let framed = self.read_response()?;
        let response = self.present(&framed)?;
        debug!(
            status = response.status_code.as_u16(),
            headers = response.headers.len(),
            body = response.body.len(),
            framing = if response.content_length.is_some() { "content-length" } else { "close" },
            "response complete"
        );
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Size of the header block (terminator included) if the terminator is in
/// `buf`. The search restarts a few bytes before `scanned` so a terminator
/// split across reads is still found.
fn find_terminator(buf: &[u8], scanned: usize) -> Option<usize> {
    let from = scanned.saturating_sub(HEADER_TERMINATOR.len() - 1);
    memmem::find(&buf[from..], HEADER_TERMINATOR).map(|pos| from + pos + HEADER_TERMINATOR.len())
}

/// Spans of the CRLF-separated lines in `content`.
fn line_spans(content: &[u8]) -> impl Iterator<Item = Span> + '_ {
    let mut start = 0;
    std::iter::from_fn(move || {
        if start > content.len() {
            return None;
        }
        let end = memmem::find(&content[start..], CRLF).map_or(content.len(), |i| start + i);
        let span = Span { start, end };
        start = end + CRLF.len();
        Some(span)
    })
}

/// Parse the status line and headers. `block` starts at buffer offset 0 and
/// ends with the terminator, so every span is an absolute buffer offset.
fn parse_head(block: &[u8]) -> Result<ResponseHead> {
    let header_size = block.len();
    let content = &block[..header_size - HEADER_TERMINATOR.len()];
    let mut lines = line_spans(content);

    let status_line = lines.next().ok_or_else(parse_failure)?;
    let (status_code, status_message) = parse_status_line(block, status_line)?;

    let mut headers = Vec::new();
    let mut content_length: Option<usize> = None;
    for span in lines {
        let line = span.of(block);
        if line.is_empty() {
            break;
        }
        let colon = match memchr(b':', line) {
            Some(0) => {
                warn!(line = %String::from_utf8_lossy(line), "header line with empty name");
                return Err(parse_failure());
            }
            Some(colon) => colon,
            None => {
                debug!(line = %String::from_utf8_lossy(line), "skipping header line without colon");
                continue;
            }
        };
        let key = Span { start: span.start, end: span.start + colon };
        let mut value_start = key.end + 1;
        while value_start < span.end && matches!(block[value_start], b' ' | b'\t') {
            value_start += 1;
        }
        let value = Span { start: value_start, end: span.end };

        let utf8 = |s: Span| std::str::from_utf8(s.of(block)).is_ok();
        if !utf8(key) || !utf8(value) {
            debug!(line = %String::from_utf8_lossy(line), "skipping header that is not utf-8");
            continue;
        }

        if key.of(block).eq_ignore_ascii_case(b"Content-Length") {
            match (content_length, parse_content_length(value.of(block))) {
                (_, None) => {
                    let raw = String::from_utf8_lossy(value.of(block));
                    debug!(value = %raw, "ignoring non-numeric content-length");
                }
                (Some(previous), Some(len)) if previous != len => {
                    warn!(previous, len, "conflicting content-length headers");
                    return Err(parse_failure());
                }
                (_, Some(len)) => content_length = Some(len),
            }
        }
        headers.push((key, value));
    }

    if let Some(len) = content_length {
        header_size.checked_add(len).ok_or_else(parse_failure)?;
    }

    Ok(ResponseHead {
        status_code,
        status_message,
        headers,
        header_size,
        content_length,
    })
}

/// `HTTP/<version> <code> <message>`. The message is everything after the
/// second space and may be empty.
fn parse_status_line(block: &[u8], span: Span) -> Result<(u16, Span)> {
    let line = span.of(block);
    if !line.starts_with(b"HTTP/") {
        warn!(line = %String::from_utf8_lossy(line), "malformed status line");
        return Err(parse_failure());
    }
    let code_start = memchr(b' ', line).ok_or_else(parse_failure)? + 1;
    let (code_end, message_start) = match memchr(b' ', &line[code_start..]) {
        Some(i) => (code_start + i, code_start + i + 1),
        None => (line.len(), line.len()),
    };

    let code = &line[code_start..code_end];
    if code.len() != 3 || !code.iter().all(u8::is_ascii_digit) {
        warn!(code = %String::from_utf8_lossy(code), "malformed status code");
        return Err(parse_failure());
    }
    let status_code = code
        .iter()
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));

    let message = Span {
        start: span.start + message_start,
        end: span.end,
    };
    Ok((status_code, message))
}

/// Decimal length with trailing whitespace allowed. Anything else, overflow
/// included, counts as no declared length.
fn parse_content_length(raw: &[u8]) -> Option<usize> {
    let end = raw
        .iter()
        .rposition(|b| !matches!(b, b' ' | b'\t'))
        .map_or(0, |i| i + 1);
    let digits = &raw[..end];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse::<usize>().ok()
}

fn text(buf: &[u8], span: Span) -> Result<&str> {
    std::str::from_utf8(span.of(buf)).map_err(|_| {
        warn!(start = span.start, end = span.end, "response text is not utf-8");
        parse_failure()
    })
}
