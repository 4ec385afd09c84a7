//! Response helpers.
//!
//! # Responsibilities
//! - Wrap handler results in the `{code, message, data}` envelope
//! - Redirects and file downloads
//!
//! # Design Decisions
//! - Business errors travel in the envelope; the HTTP status stays 200
//! - Code `0` with message `"success"` means no error

use std::path::Path;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub const TYPE_OCTET_STREAM: &str = "application/octet-stream";
pub const TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const TYPE_JSON: &str = "application/json";
pub const TYPE_XML: &str = "application/xml";
pub const TYPE_JPG: &str = "image/jpeg";
pub const TYPE_PNG: &str = "image/png";

/// Envelope returned by every JSON endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonRsp<T> {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Business error carried inside a [`CommonRsp`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn server_error() -> Self {
        Self::new(500, "Internal Server Error")
    }
}

impl<T> CommonRsp<T> {
    pub fn success(data: Option<T>) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data,
        }
    }

    pub fn error(err: &ApiError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            data: None,
        }
    }
}

/// Render a handler result as a 200 response with the envelope.
///
/// Data is included alongside an error, mirroring what handlers pass in.
pub fn json<T: Serialize>(data: Option<T>, result: Result<(), ApiError>) -> Response {
    let rsp = match result {
        Ok(()) => CommonRsp::success(data),
        Err(err) => CommonRsp {
            data,
            ..CommonRsp::error(&err)
        },
    };
    (StatusCode::OK, Json(rsp)).into_response()
}

/// 302 redirect to `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect location").into_response(),
    }
}

/// Serve a file as a download named `file_name`.
pub async fn attachment(path: impl AsRef<Path>, file_name: &str) -> Response {
    let path = path.as_ref();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read attachment");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TYPE_OCTET_STREAM));
    match HeaderValue::from_str(&disposition) {
        Ok(value) => {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        Err(_) => tracing::warn!(file_name, "Attachment name is not a valid header value"),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json as j, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope() {
        let response = json(Some(j!({"id": 7})), Ok(()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            j!({"code": 0, "message": "success", "data": {"id": 7}})
        );
    }

    #[tokio::test]
    async fn error_envelope_keeps_http_200_and_omits_empty_data() {
        let response = json::<()>(None, Err(ApiError::new(10003, "token expired")));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            j!({"code": 10003, "message": "token expired"})
        );
    }

    #[test]
    fn redirect_sets_location() {
        let response = redirect("/login");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn attachment_sets_disposition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let response = attachment(&path, "report.csv").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"report.csv\""
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn missing_attachment_is_404() {
        let response = attachment("/no/such/file", "x").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
