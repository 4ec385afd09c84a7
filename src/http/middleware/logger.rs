//! Per-request log line.
//!
//! One `info` event per request with status, latency, client IP, method and
//! path. Health-check style paths are skipped.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::config::RequestLogConfig;
use crate::http::client_ip::client_ip;
use crate::observability::metrics;

const DEFAULT_IGNORED_PATHS: [&str; 4] = ["/", "/ping", "/health", "/healthCheck"];

/// Shared state for [`request_log_middleware`].
#[derive(Debug, Clone)]
pub struct RequestLogger {
    enabled: bool,
    ignored: Arc<HashSet<String>>,
}

impl RequestLogger {
    pub fn new(config: &RequestLogConfig) -> Self {
        let ignored = DEFAULT_IGNORED_PATHS
            .iter()
            .map(|p| p.to_string())
            .chain(config.ignored_paths.iter().filter(|p| !p.is_empty()).cloned())
            .collect();
        Self {
            enabled: config.enabled,
            ignored: Arc::new(ignored),
        }
    }

    /// Whether a request for `path_and_query` produces a log line.
    pub fn should_log(&self, path_and_query: &str) -> bool {
        self.enabled && !self.ignored.contains(path_and_query)
    }
}

pub async fn request_log_middleware(
    State(logger): State<RequestLogger>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer).unwrap_or_default();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    metrics::record_request(method.as_str(), status, start);

    if logger.should_log(&path) {
        tracing::info!(
            status,
            latency = ?start.elapsed(),
            client_ip = %ip,
            method = %method,
            path = %path,
            "request"
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_builtin_and_configured_paths() {
        let logger = RequestLogger::new(&RequestLogConfig {
            enabled: true,
            ignored_paths: vec!["/metrics".into(), String::new()],
        });
        assert!(!logger.should_log("/ping"));
        assert!(!logger.should_log("/healthCheck"));
        assert!(!logger.should_log("/metrics"));
        assert!(logger.should_log("/api/orders?id=1"));
        assert!(logger.should_log(""));
    }

    #[test]
    fn disabled_logger_logs_nothing() {
        let logger = RequestLogger::new(&RequestLogConfig {
            enabled: false,
            ignored_paths: Vec::new(),
        });
        assert!(!logger.should_log("/api"));
    }
}
