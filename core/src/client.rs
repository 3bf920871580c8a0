//! Request-validating façade over a protocol engine.
//!
//! # Design
//! `HttpClient` adds no state of its own. `get` and `post` check the shape
//! of the request, force the method, and hand the request to the engine.
//! Every check runs before any I/O, so a rejected request leaves the
//! connection and the engine buffer untouched.

use tracing::warn;

use crate::config::{ClientConfig, TransportConfig, TransportKind};
use crate::error::{HttpClientError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::protocol::{Http1Protocol, HttpProtocol};
use crate::transport::AnyTransport;

/// HTTP/1.1 client.
///
/// Generic over the engine so tests and lower-level callers can supply
/// their own; the default is the HTTP/1.1 engine over a runtime-selected
/// socket transport.
#[derive(Debug)]
pub struct HttpClient<P: HttpProtocol = Http1Protocol<AnyTransport>> {
    protocol: P,
}

impl HttpClient<Http1Protocol<AnyTransport>> {
    /// A client with default protocol and transport options.
    pub fn new(kind: TransportKind) -> Self {
        let transport = AnyTransport::new(kind, TransportConfig::default());
        Self::with_protocol(Http1Protocol::new(transport))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = AnyTransport::new(config.transport, config.transport_options.clone());
        Ok(Self::with_protocol(Http1Protocol::with_config(
            transport,
            config.protocol.clone(),
        )))
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.protocol.transport().kind()
    }
}

impl<P: HttpProtocol> HttpClient<P> {
    pub fn with_protocol(protocol: P) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Direct engine access, for callers that need `perform_request`.
    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    pub fn into_protocol(self) -> P {
        self.protocol
    }

    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.protocol.connect(host, port)
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.protocol.disconnect()
    }

    /// Send a GET. The request must not carry a body.
    pub fn get(&mut self, request: HttpRequest<'_>) -> Result<HttpResponse<'_>> {
        let request = as_get(request)?;
        self.protocol.perform_request(&request)
    }

    /// Send a POST. The request needs a body and a `Content-Length` header;
    /// the header value is not checked against the body.
    pub fn post(&mut self, request: HttpRequest<'_>) -> Result<HttpResponse<'_>> {
        let request = as_post(request)?;
        self.protocol.perform_request(&request)
    }

    /// `get` returning a response that does not borrow the client.
    pub fn get_owned(&mut self, request: HttpRequest<'_>) -> Result<HttpResponse<'static>> {
        let request = as_get(request)?;
        self.protocol.perform_request_owned(&request)
    }

    /// `post` returning a response that does not borrow the client.
    pub fn post_owned(&mut self, request: HttpRequest<'_>) -> Result<HttpResponse<'static>> {
        let request = as_post(request)?;
        self.protocol.perform_request_owned(&request)
    }
}

fn as_get(mut request: HttpRequest<'_>) -> Result<HttpRequest<'_>> {
    if !request.body.is_empty() {
        warn!(path = request.path, body = request.body.len(), "GET with a body rejected");
        return Err(HttpClientError::InvalidRequest.into());
    }
    request.method = HttpMethod::Get;
    Ok(request)
}

fn as_post(mut request: HttpRequest<'_>) -> Result<HttpRequest<'_>> {
    if request.body.is_empty() {
        warn!(path = request.path, "POST without a body rejected");
        return Err(HttpClientError::InvalidRequest.into());
    }
    if !request.has_header("Content-Length") {
        warn!(path = request.path, "POST without Content-Length rejected");
        return Err(HttpClientError::InvalidRequest.into());
    }
    request.method = HttpMethod::Post;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseMode;
    use crate::error::Error;
    use crate::testing::ScriptedTransport;
    use crate::transport::Transport;

    const OK: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";

    fn scripted(transport: ScriptedTransport) -> HttpClient<Http1Protocol<ScriptedTransport>> {
        HttpClient::with_protocol(Http1Protocol::new(transport))
    }

    fn invalid() -> Error {
        Error::Http(HttpClientError::InvalidRequest)
    }

    #[test]
    fn get_with_body_is_rejected_before_io() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        let err = client.get(HttpRequest::post("/", b"data")).unwrap_err();

        assert_eq!(err, invalid());
        assert!(client.protocol().transport().written().is_empty());
        assert_eq!(client.protocol().transport().write_calls(), 0);
    }

    #[test]
    fn post_without_body_is_rejected_before_io() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        let request = HttpRequest::post("/", b"").header("Content-Length", "0");
        assert_eq!(client.post(request).unwrap_err(), invalid());
        assert!(client.protocol().transport().written().is_empty());
    }

    #[test]
    fn post_without_content_length_is_rejected_before_io() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        let request = HttpRequest::post("/", b"key=value").header("Host", "h");
        assert_eq!(client.post(request).unwrap_err(), invalid());
        assert!(client.protocol().transport().written().is_empty());
    }

    #[test]
    fn rejected_request_leaves_client_usable() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        assert!(client.get(HttpRequest::post("/", b"x")).is_err());

        let res = client.get(HttpRequest::get("/")).unwrap();
        assert_eq!(res.status_code, 200);
        assert_eq!(res.body.as_ref(), b"ok");
    }

    #[test]
    fn content_length_match_is_case_insensitive() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        let request = HttpRequest::post("/submit", b"abc").header("content-length", "3");
        assert!(client.post(request).is_ok());
    }

    #[test]
    fn content_length_value_is_not_checked() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        let request = HttpRequest::post("/submit", b"abc").header("Content-Length", "99");
        client.post(request).unwrap();
        assert!(client
            .protocol()
            .transport()
            .written()
            .ends_with(b"Content-Length: 99\r\n\r\nabc"));
    }

    #[test]
    fn get_forces_method() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        let mut request = HttpRequest::get("/thing");
        request.method = HttpMethod::Post;
        client.get(request).unwrap();
        assert!(client.protocol().transport().written().starts_with(b"GET /thing HTTP/1.1\r\n"));
    }

    #[test]
    fn post_forces_method() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        let mut request = HttpRequest::post("/thing", b"x").with_content_length();
        request.method = HttpMethod::Get;
        client.post(request).unwrap();
        assert_eq!(
            client.protocol().transport().written(),
            b"POST /thing HTTP/1.1\r\nContent-Length: 1\r\n\r\nx"
        );
    }

    #[test]
    fn owned_responses_are_held_across_requests() {
        let transport = ScriptedTransport::connected()
            .respond(OK)
            .respond(b"HTTP/1.1 201 Created\r\nContent-Length: 4\r\n\r\ndone");
        let mut client = scripted(transport);

        let first = client.get_owned(HttpRequest::get("/a")).unwrap();
        let request = HttpRequest::post("/b", b"x").with_content_length();
        let second = client.post_owned(request).unwrap();

        assert!(!first.is_borrowed());
        assert_eq!(first.body.as_ref(), b"ok");
        assert_eq!(second.status_message, "Created");
        assert_eq!(second.body.as_ref(), b"done");
    }

    #[test]
    fn get_owned_detaches_zero_copy_responses() {
        let protocol = Http1Protocol::with_config(
            ScriptedTransport::connected().respond(OK).respond(OK),
            crate::config::ProtocolConfig::zero_copy(),
        );
        let mut client = HttpClient::with_protocol(protocol);

        let first = client.get_owned(HttpRequest::get("/")).unwrap();
        let second = client.get_owned(HttpRequest::get("/")).unwrap();
        assert!(!first.is_borrowed());
        assert_eq!(first.body, second.body);
    }

    #[test]
    fn owned_variants_validate_before_io() {
        let mut client = scripted(ScriptedTransport::connected().respond(OK));
        assert_eq!(client.get_owned(HttpRequest::post("/", b"x")).unwrap_err(), invalid());
        assert_eq!(client.post_owned(HttpRequest::post("/", b"x")).unwrap_err(), invalid());
        assert_eq!(client.protocol().transport().write_calls(), 0);
    }

    #[test]
    fn connect_and_double_disconnect() {
        let mut client = scripted(ScriptedTransport::new());
        client.connect("localhost", 8080).unwrap();
        assert!(client.protocol().transport().is_connected());
        assert!(client.disconnect().is_ok());
        assert!(client.disconnect().is_ok());
        assert_eq!(client.protocol().transport().close_calls(), 2);
    }

    #[test]
    fn transport_errors_pass_through() {
        let mut client = scripted(ScriptedTransport::connected().then_close());
        let err = client.get(HttpRequest::get("/")).unwrap_err();
        assert!(err.is_connection_closed());
    }

    #[test]
    fn from_config_selects_transport_and_policy() {
        let config = ClientConfig::from_json(
            r#"{"transport":"unix","protocol":{"response_mode":"zero_copy"}}"#,
        )
        .unwrap();
        let client = HttpClient::from_config(&config).unwrap();
        assert_eq!(client.transport_kind(), TransportKind::Unix);
        assert_eq!(client.protocol().config().response_mode, ResponseMode::ZeroCopy);
        assert_eq!(client.protocol().buffer_capacity(), 0);
    }

    #[test]
    fn from_config_rejects_invalid_options() {
        let config = ClientConfig {
            transport_options: TransportConfig {
                read_timeout_ms: Some(0),
                ..TransportConfig::default()
            },
            ..ClientConfig::default()
        };
        assert_eq!(
            HttpClient::from_config(&config).unwrap_err(),
            Error::Http(HttpClientError::InitFailure)
        );
    }

    #[test]
    fn new_defaults_to_owning_tcp() {
        let client = HttpClient::new(TransportKind::Tcp);
        assert_eq!(client.transport_kind(), TransportKind::Tcp);
        assert_eq!(client.protocol().config().response_mode, ResponseMode::Owning);
        assert!(!client.protocol().transport().is_connected());
    }
}
