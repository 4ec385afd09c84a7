//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig.bind_address
//!     → listener.rs (parse, bind)
//!     → Hand off to HTTP layer (axum::serve)
//! ```

pub mod listener;

pub use listener::{bind, ListenerError};
