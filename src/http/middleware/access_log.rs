//! Structured access log with buffered bodies.
//!
//! # Responsibilities
//! - Capture request and response bodies without disturbing the handler
//! - Emit one JSON record per request under the `access_log` target
//!
//! # Design Decisions
//! - Logging never changes the response; bodies declaring more than the
//!   limit stream through and are logged as omitted
//! - Only allow-listed request headers are recorded
//! - `res_code`/`res_msg` are read from the JSON envelope when there is one

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::http::client_ip::client_ip;
use crate::http::response::CommonRsp;

const DEFAULT_HEADERS: [&str; 19] = [
    "Content-Type",
    "Content-Length",
    "Accept",
    "Origin",
    "Host",
    "Connection",
    "Accept-Encoding",
    "Accept-Language",
    "User-Agent",
    "Referer",
    "Cookie",
    "Authorization",
    "X-Real-IP",
    "X-Forwarded-For",
    "X-Forwarded-Proto",
    "X-Forwarded-Host",
    "X-Forwarded-Port",
    "X-Forwarded-Server",
    "X-Forwarded-For-Original",
];

const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Access log settings, used as middleware state.
#[derive(Debug, Clone)]
pub struct AccessLog {
    app_name: Arc<str>,
    headers: Arc<Vec<String>>,
    max_body_bytes: usize,
}

impl AccessLog {
    pub fn new(app_name: impl Into<String>) -> Self {
        let app_name: String = app_name.into();
        Self {
            app_name: Arc::from(app_name),
            headers: Arc::new(DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect()),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Replace the recorded request headers.
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Arc::new(headers.into_iter().map(Into::into).collect());
        self
    }

    /// Record additional request headers.
    pub fn add_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = self.headers.as_ref().clone();
        all.extend(headers.into_iter().map(Into::into));
        self.headers = Arc::new(all);
        self
    }

    /// Largest request or response body that will be logged.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    fn request_headers(&self, headers: &HeaderMap) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .filter_map(|name| {
                let value = headers.get(name.as_str())?.to_str().ok()?;
                Some((name.clone(), value.to_string()))
            })
            .collect()
    }
}

/// One access log record.
#[derive(Debug, Clone, Serialize)]
pub struct AccessRecord {
    pub app_name: String,
    pub cost_ms: u64,
    pub ts: u64,

    pub client_ip: String,
    pub method: String,
    pub schema: String,
    pub host: String,
    pub path: String,
    pub req_header: BTreeMap<String, String>,
    pub req_body: String,

    pub status_code: u16,
    pub res_header: BTreeMap<String, String>,
    pub res_code: i32,
    pub res_msg: String,
    pub res_body: String,
}

pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let (parts, body) = request.into_parts();
    let (body, _, req_text) = match capture(body, log.max_body_bytes).await {
        Ok(captured) => captured,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.host())
        .unwrap_or_default()
        .to_string();

    let mut record = AccessRecord {
        app_name: log.app_name.to_string(),
        cost_ms: 0,
        ts,
        client_ip: client_ip(&parts.headers, peer).unwrap_or_default(),
        method: parts.method.to_string(),
        schema: parts.uri.scheme_str().unwrap_or("http").to_string(),
        host,
        path: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        req_header: log.request_headers(&parts.headers),
        req_body: req_text,
        status_code: 0,
        res_header: BTreeMap::new(),
        res_code: 0,
        res_msg: String::new(),
        res_body: String::new(),
    };

    let response = next.run(Request::from_parts(parts, body)).await;

    let (parts, body) = response.into_parts();
    let (body, res_bytes, _) = match capture(body, log.max_body_bytes).await {
        Ok(captured) => captured,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    record.status_code = parts.status.as_u16();
    record.res_header = parts
        .headers
        .keys()
        .filter_map(|name| {
            let value = parts.headers.get(name)?.to_str().ok()?;
            Some((name.to_string(), value.to_string()))
        })
        .collect();
    if let Some(envelope) = res_bytes.as_ref().and_then(parse_envelope) {
        record.res_code = envelope.code;
        record.res_msg = envelope.message.clone();
        record.res_body = serde_json::to_string(&envelope).unwrap_or_default();
    }
    record.cost_ms = start.elapsed().as_millis() as u64;

    match serde_json::to_string(&record) {
        Ok(line) => tracing::info!(target: "access_log", "{}", line),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize access log record"),
    }

    Response::from_parts(parts, body)
}

/// Buffer `body` so it can be logged and still passed on.
///
/// Bodies declaring more than `limit` bytes stream through untouched and are
/// logged as omitted. Buffered bodies are logged up to `limit` bytes.
async fn capture(body: Body, limit: usize) -> Result<(Body, Option<Bytes>, String), axum::Error> {
    let declared = body.size_hint().lower();
    if declared > limit as u64 {
        return Ok((body, None, format!("<omitted {declared} bytes>")));
    }

    let bytes = axum::body::to_bytes(body, usize::MAX).await?;
    let text = if bytes.len() > limit {
        format!(
            "{}<truncated {} bytes>",
            String::from_utf8_lossy(&bytes[..limit]),
            bytes.len() - limit
        )
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };
    Ok((Body::from(bytes.clone()), Some(bytes), text))
}

fn parse_envelope(body: &Bytes) -> Option<CommonRsp<serde_json::Value>> {
    serde_json::from_slice(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        middleware,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn header_allow_list_can_be_replaced_and_extended() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", "acme".parse().unwrap());
        headers.insert("user-agent", "curl".parse().unwrap());
        headers.insert("x-trace", "t-1".parse().unwrap());

        let default = AccessLog::new("svc");
        let recorded = default.request_headers(&headers);
        assert_eq!(recorded.get("User-Agent").map(String::as_str), Some("curl"));
        assert!(!recorded.contains_key("x-tenant"));

        let replaced = AccessLog::new("svc").with_headers(["x-tenant"]).add_headers(["x-trace"]);
        let recorded = replaced.request_headers(&headers);
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded["x-tenant"], "acme");
        assert_eq!(recorded["x-trace"], "t-1");
    }

    #[test]
    fn envelope_is_parsed_when_present() {
        let env = parse_envelope(&Bytes::from_static(br#"{"code":7,"message":"nope"}"#)).unwrap();
        assert_eq!(env.code, 7);
        assert_eq!(env.message, "nope");
        assert!(parse_envelope(&Bytes::from_static(b"plain text")).is_none());
    }

    #[tokio::test]
    async fn bodies_pass_through_untouched() {
        let app = Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .layer(middleware::from_fn_with_state(
                AccessLog::new("test"),
                access_log_middleware,
            ));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn capture_omits_or_truncates_large_bodies() {
        let (body, bytes, text) = capture(Body::from("0123456789"), 4).await.unwrap();
        assert_eq!(text, "<omitted 10 bytes>");
        assert!(bytes.is_none());
        let passed = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&passed[..], b"0123456789");

        let stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"0123456789"))]);
        let (body, bytes, text) = capture(Body::from_stream(stream), 4).await.unwrap();
        assert_eq!(text, "0123<truncated 6 bytes>");
        assert_eq!(bytes.unwrap().len(), 10);
        let passed = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&passed[..], b"0123456789");
    }

    #[tokio::test]
    async fn oversized_bodies_pass_through_unchanged() {
        let app = Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .route("/big", get(|| async { "x".repeat(64) }))
            .layer(middleware::from_fn_with_state(
                AccessLog::new("test").max_body_bytes(4),
                access_log_middleware,
            ));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from("way too long"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"way too long");

        let response = app
            .oneshot(Request::builder().uri("/big").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), 64);
    }
}
