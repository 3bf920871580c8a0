//! HTTP/1.1 request and response types.
//!
//! # Design
//! Requests borrow everything from the caller; the engine serializes them
//! straight into its buffer. Responses use `Cow` fields so one type covers
//! both memory policies: under `ResponseMode::ZeroCopy` every field is
//! `Borrowed` from the engine's buffer and the response cannot outlive the
//! next request; under `ResponseMode::Owning` every field is `Owned` and
//! `into_owned` detaches it from the engine for free.

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A header as a key-value pair. Key case is preserved as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader<'a> {
    pub key: Cow<'a, str>,
    pub value: Cow<'a, str>,
}

impl<'a> HttpHeader<'a> {
    pub fn new(key: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name)
    }

    pub fn into_owned(self) -> HttpHeader<'static> {
        HttpHeader {
            key: Cow::Owned(self.key.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
        }
    }
}

/// An outgoing request. Headers are written in order, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub method: HttpMethod,
    pub path: &'a str,
    pub headers: Vec<HttpHeader<'a>>,
    pub body: &'a [u8],
}

impl<'a> HttpRequest<'a> {
    pub fn get(path: &'a str) -> Self {
        Self {
            method: HttpMethod::Get,
            path,
            headers: Vec::new(),
            body: &[],
        }
    }

    /// A POST carrying `body`. No `Content-Length` is added; see
    /// `with_content_length`.
    pub fn post(path: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: HttpMethod::Post,
            path,
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, key: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        self.headers.push(HttpHeader::new(key, value));
        self
    }

    /// Append a `Content-Length` header matching the current body.
    pub fn with_content_length(self) -> Self {
        let len = self.body.len().to_string();
        self.header("Content-Length", len)
    }

    /// Case-insensitive presence check.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }
}

/// Status code with named constants for the codes clients branch on most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const CONTINUE: StatusCode = StatusCode(100);
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const ACCEPTED: StatusCode = StatusCode(202);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl PartialEq<u16> for StatusCode {
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed response. See the module docs for the borrowing rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse<'a> {
    pub status_code: StatusCode,
    pub status_message: Cow<'a, str>,
    /// Headers in wire order, case preserved, duplicates kept.
    pub headers: Vec<HttpHeader<'a>>,
    pub body: Cow<'a, [u8]>,
    /// The framing length, if the response declared one.
    pub content_length: Option<usize>,
}

impl<'a> HttpResponse<'a> {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_ref())
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// True if every field borrows the engine's buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.body, Cow::Borrowed(_))
    }

    /// Detach from the engine. Copies only the fields that are still
    /// borrowed, so this is a move for responses built in owning mode.
    pub fn into_owned(self) -> HttpResponse<'static> {
        HttpResponse {
            status_code: self.status_code,
            status_message: Cow::Owned(self.status_message.into_owned()),
            headers: self.headers.into_iter().map(HttpHeader::into_owned).collect(),
            body: Cow::Owned(self.body.into_owned()),
            content_length: self.content_length,
        }
    }
}
