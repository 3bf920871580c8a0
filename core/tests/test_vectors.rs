//! Replay the JSON vectors in `test-vectors/` through the protocol engine.
//!
//! Response vectors are fed through a scripted transport at the listed read
//! boundaries and at every single split point, under both memory policies.
//! Request vectors check the exact wire bytes under both write modes.

use rawhttp_core::testing::ScriptedTransport;
use rawhttp_core::{
    Error, Http1Protocol, HttpClientError, HttpHeader, HttpMethod, HttpProtocol, HttpRequest,
    HttpResponse, ProtocolConfig, ResponseMode, TransportError, WriteMode,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ResponseVectors {
    cases: Vec<ResponseCase>,
}

#[derive(Debug, Deserialize)]
struct ResponseCase {
    name: String,
    response: String,
    close_after: bool,
    splits: Vec<Vec<usize>>,
    expected: Option<ExpectedResponse>,
    expected_error: Option<String>,
}

#[derive(Debug, PartialEq, Deserialize)]
struct ExpectedResponse {
    status_code: u16,
    status_message: String,
    headers: Vec<(String, String)>,
    body: String,
    content_length: Option<usize>,
}

impl ExpectedResponse {
    fn from_response(res: &HttpResponse<'_>) -> Self {
        Self {
            status_code: res.status_code.as_u16(),
            status_message: res.status_message.to_string(),
            headers: res
                .headers
                .iter()
                .map(|h| (h.key.to_string(), h.value.to_string()))
                .collect(),
            body: String::from_utf8(res.body.to_vec()).unwrap(),
            content_length: res.content_length,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RequestVectors {
    cases: Vec<RequestCase>,
}

#[derive(Debug, Deserialize)]
struct RequestCase {
    name: String,
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
    expected: String,
}

fn parse_error(s: &str) -> Error {
    match s {
        "http_parse_failure" => Error::Http(HttpClientError::HttpParseFailure),
        "connection_closed" => Error::Transport(TransportError::ConnectionClosed),
        other => panic!("unknown error: {other}"),
    }
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn replay(
    case: &ResponseCase,
    cuts: &[usize],
    mode: ResponseMode,
) -> Result<ExpectedResponse, Error> {
    let mut transport = ScriptedTransport::connected().respond_split(&case.response, cuts);
    if case.close_after {
        transport = transport.then_close();
    }
    let config = ProtocolConfig {
        response_mode: mode,
        ..ProtocolConfig::default()
    };
    let mut protocol = Http1Protocol::with_config(transport, config);
    let res = protocol.perform_request(&HttpRequest::get("/"))?;
    assert_eq!(
        res.is_borrowed(),
        mode == ResponseMode::ZeroCopy,
        "{}: memory policy",
        case.name
    );
    Ok(ExpectedResponse::from_response(&res))
}

#[test]
fn response_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: ResponseVectors = serde_json::from_str(raw).unwrap();

    for case in &vectors.cases {
        let name = &case.name;
        let single_cuts = (1..case.response.len()).map(|cut| vec![cut]);
        let all_cuts: Vec<Vec<usize>> = case.splits.iter().cloned().chain(single_cuts).collect();

        for cuts in &all_cuts {
            for mode in [ResponseMode::Owning, ResponseMode::ZeroCopy] {
                let outcome = replay(case, cuts, mode);
                match (&case.expected, &case.expected_error) {
                    (Some(expected), None) => {
                        let got = outcome.unwrap_or_else(|e| panic!("{name} {cuts:?}: {e}"));
                        assert_eq!(&got, expected, "{name} {cuts:?} {mode:?}");
                    }
                    (None, Some(err)) => {
                        assert_eq!(outcome.unwrap_err(), parse_error(err), "{name} {cuts:?}");
                    }
                    _ => panic!("{name}: vector needs exactly one of expected / expected_error"),
                }
            }
        }
    }
}

#[test]
fn request_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: RequestVectors = serde_json::from_str(raw).unwrap();
    let ok = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";

    for case in &vectors.cases {
        let request = HttpRequest {
            method: parse_method(&case.method),
            path: &case.path,
            headers: case
                .headers
                .iter()
                .map(|(k, v)| HttpHeader::new(k.as_str(), v.as_str()))
                .collect(),
            body: case.body.as_bytes(),
        };

        for write_mode in [WriteMode::Copy, WriteMode::Vectored] {
            let config = ProtocolConfig {
                write_mode,
                ..ProtocolConfig::default()
            };
            let mut protocol =
                Http1Protocol::with_config(ScriptedTransport::connected().respond(ok), config);
            protocol.perform_request(&request).unwrap();

            assert_eq!(
                String::from_utf8_lossy(protocol.transport().written()),
                case.expected,
                "{} {write_mode:?}",
                case.name
            );
        }
    }
}
