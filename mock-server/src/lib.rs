use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Largest body `/bytes/{n}` will produce.
pub const MAX_GENERATED_BYTES: usize = 16 * 1024 * 1024;

/// Shape of `GET /headers`: request headers in the order received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEcho {
    pub headers: Vec<(String, String)>,
}

/// Shape of `GET /stats`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub requests: u64,
}

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

pub fn app() -> Router {
    let counter = Counter::default();
    Router::new()
        .route("/health", get(health))
        .route("/bytes/{n}", get(generated_bytes))
        .route("/echo", post(echo))
        .route("/status/{code}", get(status))
        .route("/headers", get(echo_headers))
        .route("/stats", get(stats))
        .layer(middleware::map_response(tag_request_id))
        .layer(middleware::map_request_with_state(counter.clone(), count_request))
        .with_state(counter)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

#[cfg(unix)]
pub async fn run_unix(listener: tokio::net::UnixListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Deterministic body content: `abc...zabc...` of length `n`.
pub fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| b'a' + (i % 26) as u8).collect()
}

async fn count_request(State(counter): State<Counter>, request: Request) -> Request {
    counter.0.fetch_add(1, Ordering::Relaxed);
    request
}

async fn tag_request_id(mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

async fn health() -> &'static str {
    "ok"
}

async fn generated_bytes(Path(n): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if n > MAX_GENERATED_BYTES {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(pattern(n))
}

async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

async fn status(Path(code): Path<u16>) -> Result<Response, StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    // Statuses that forbid a body are not served.
    if status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    let reason = status.canonical_reason().unwrap_or("Unknown");
    Ok((status, reason.to_string()).into_response())
}

async fn echo_headers(headers: HeaderMap) -> Json<HeaderEcho> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(HeaderEcho { headers })
}

async fn stats(State(counter): State<Counter>) -> Json<Stats> {
    Json(Stats {
        requests: counter.0.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_cycles_through_the_alphabet() {
        let body = pattern(28);
        assert_eq!(&body[..3], b"abc");
        assert_eq!(body[25], b'z');
        assert_eq!(&body[26..], b"ab");
    }

    #[test]
    fn pattern_of_zero_is_empty() {
        assert!(pattern(0).is_empty());
    }

    #[test]
    fn header_echo_roundtrips_through_json() {
        let echo = HeaderEcho {
            headers: vec![("host".to_string(), "example.com".to_string())],
        };
        let json = serde_json::to_string(&echo).unwrap();
        assert_eq!(json, r#"{"headers":[["host","example.com"]]}"#);
        let back: HeaderEcho = serde_json::from_str(&json).unwrap();
        assert_eq!(back, echo);
    }

    #[test]
    fn stats_serializes_count() {
        let json = serde_json::to_value(Stats { requests: 3 }).unwrap();
        assert_eq!(json["requests"], 3);
    }
}
