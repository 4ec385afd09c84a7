//! Upstream forwarding.
//!
//! # Responsibilities
//! - Relay an incoming request to an upstream and stream the reply back
//! - Call an upstream and decode its `{code, message, data}` envelope
//!
//! # Design Decisions
//! - One pooled hyper client per `Forwarder`, shared by clones
//! - The whole exchange is bounded by a single timeout (60s default)
//! - The client's `Host` header is dropped so the upstream sees its own

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::de::DeserializeOwned;

use crate::http::response::CommonRsp;

pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid upstream URI: {0}")]
    InvalidUri(String),

    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read upstream body: {0}")]
    Body(#[from] axum::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode upstream envelope: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("upstream envelope carried no data")]
    MissingData,
}

/// Relays requests to one upstream base URL.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    upstream: String,
    timeout: Duration,
}

impl Forwarder {
    /// `upstream` is a base such as `http://10.0.0.5:8080`.
    pub fn new(upstream: &str) -> Result<Self, ProxyError> {
        let upstream = upstream.trim_end_matches('/');
        let uri: Uri = upstream
            .parse()
            .map_err(|_| ProxyError::InvalidUri(upstream.to_string()))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ProxyError::InvalidUri(upstream.to_string()));
        }

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self {
            client,
            upstream: upstream.to_string(),
            timeout: DEFAULT_PROXY_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Forward `request` as-is and return the upstream's response.
    ///
    /// Transport failures become a 500 with the error text as body.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let method = request.method().clone();
        let result = async {
            let upstream_req = self.upstream_request(request, None, None)?;
            self.send(upstream_req).await
        }
        .await;

        match result {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(upstream = %self.upstream, method = %method, error = %e, "Upstream error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }

    /// Call the upstream and return the `data` of its envelope.
    ///
    /// `method` and `path` override the incoming request's method and
    /// path-and-query when given. Any status other than 200 is an error
    /// carrying the upstream body.
    ///
    /// An envelope without `data` is [`ProxyError::MissingData`], never a
    /// default value.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        request: Request<Body>,
        method: Option<Method>,
        path: Option<&str>,
    ) -> Result<T, ProxyError> {
        let upstream_req = self.upstream_request(request, method, path)?;
        let timeout = self.timeout;

        let (status, bytes) = tokio::time::timeout(timeout, async {
            let response = self.client.request(upstream_req).await?;
            let status = response.status();
            let bytes = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX).await?;
            Ok::<_, ProxyError>((status, bytes))
        })
        .await
        .map_err(|_| ProxyError::Timeout(timeout))??;

        if status != StatusCode::OK {
            return Err(ProxyError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let envelope: CommonRsp<T> = serde_json::from_slice(&bytes)?;
        envelope.data.ok_or(ProxyError::MissingData)
    }

    async fn send(
        &self,
        request: Request<Body>,
    ) -> Result<Response<hyper::body::Incoming>, ProxyError> {
        tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| ProxyError::Timeout(self.timeout))?
            .map_err(ProxyError::from)
    }

    fn upstream_request(
        &self,
        request: Request<Body>,
        method: Option<Method>,
        path: Option<&str>,
    ) -> Result<Request<Body>, ProxyError> {
        let (parts, body) = request.into_parts();

        let path = match path {
            Some(p) => p.to_string(),
            None => parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        };
        let target = format!("{}{}", self.upstream, path);
        let uri: Uri = target
            .parse()
            .map_err(|_| ProxyError::InvalidUri(target.clone()))?;

        let mut builder = Request::builder()
            .method(method.unwrap_or(parts.method))
            .uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in parts.headers.iter() {
                if name != header::HOST {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        Ok(builder.body(body)?)
    }
}
