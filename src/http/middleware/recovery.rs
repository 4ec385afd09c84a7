//! Panic recovery for request handlers.
//!
//! A handler panic is logged with its message and turned into a 500 whose
//! body is the standard error envelope. The connection stays usable.

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::http::response::{ApiError, CommonRsp};
use crate::lifecycle::shutdown::panic_message;

pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Layer that converts handler panics into 500 responses.
pub fn recovery_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(payload.as_ref());
    tracing::error!(panic = %message, "Handler panicked");

    let body: CommonRsp<()> = CommonRsp::error(&ApiError::server_error());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
