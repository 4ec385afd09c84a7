//! Graceful HTTP service wrapper.
//!
//! Serves an axum router behind a standard middleware stack and runs
//! registered hooks, in order, when the process is asked to terminate.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use http::{HttpServer, ServeError};
pub use lifecycle::{DrainPolicy, Hook, HookContext, HookPhase, ShutdownPlan};
