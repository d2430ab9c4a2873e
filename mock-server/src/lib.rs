//! Fixture servers for exercising the HTTP client end to end.
//!
//! `app()` is an axum router with deterministic endpoints; `raw` replays
//! canned bytes for cases a well-behaved server would never produce.

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub mod raw;

/// Largest body `/bytes/{n}` will generate.
pub const MAX_GENERATED_BYTES: usize = 16 * 1024 * 1024;

/// What `/target` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetEcho {
    pub uri: String,
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/status/{code}", get(status))
        .route("/echo", post(echo))
        .route("/bytes/{n}", get(bytes))
        .route("/target", get(target))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Deterministic body of `len` bytes: 0, 1, .., 250, 0, 1, ..
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn echo(headers: HeaderMap, body: Bytes) -> (HeaderMap, Bytes) {
    let mut out = HeaderMap::new();
    out.insert(
        HeaderName::from_static("x-received-length"),
        HeaderValue::from(body.len()),
    );
    for (name, source) in [
        ("x-content-length", header::CONTENT_LENGTH),
        ("x-content-type", header::CONTENT_TYPE),
    ] {
        if let Some(value) = headers.get(&source) {
            out.insert(HeaderName::from_static(name), value.clone());
        }
    }
    (out, body)
}

async fn bytes(Path(n): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if n > MAX_GENERATED_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    Ok(pattern(n))
}

async fn target(uri: Uri, headers: HeaderMap) -> Json<TargetEcho> {
    let text = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(TargetEcho {
        uri: uri.to_string(),
        host: text(header::HOST),
        user_agent: text(header::USER_AGENT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_at_251() {
        let body = pattern(260);
        assert_eq!(body.len(), 260);
        assert_eq!(body[0], 0);
        assert_eq!(body[250], 250);
        assert_eq!(body[251], 0);
    }

    #[test]
    fn target_echo_roundtrips_through_json() {
        let echo = TargetEcho {
            uri: "/target".to_string(),
            host: Some("127.0.0.1:8080".to_string()),
            user_agent: None,
        };
        let json = serde_json::to_string(&echo).unwrap();
        let back: TargetEcho = serde_json::from_str(&json).unwrap();
        assert_eq!(back, echo);
    }
}
