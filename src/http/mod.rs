//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack, graceful shutdown)
//!     → request.rs (request ID)
//!     → middleware/ (recovery, logging, rate limit, CORS, access log)
//!     → user routes
//!         → response.rs ({code, message, data} envelope)
//!         → proxy.rs (optional relay to an upstream)
//!     → Send to client
//! ```

pub mod client_ip;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use client_ip::client_ip;
pub use proxy::{Forwarder, ProxyError};
pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use response::{attachment, json, redirect, ApiError, CommonRsp};
pub use server::{HttpServer, ServeError};
