//! Request pipeline middleware.
//!
//! # Ordering (outermost first, as wired by `HttpServer`)
//! ```text
//! request id → trace → recovery → request log → rate limit → timeouts → routes
//! ```
//!
//! `cors` and `access_log` are opt-in; mount them on your own router.

pub mod access_log;
pub mod cors;
pub mod logger;
pub mod recovery;

pub use access_log::{access_log_middleware, AccessLog, AccessRecord};
pub use cors::cors_middleware;
pub use logger::{request_log_middleware, RequestLogger};
pub use recovery::recovery_layer;
