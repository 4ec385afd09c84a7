//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick the default level from config (`debug` forces debug level)
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ServerConfig};

/// Default filter directive derived from config.
pub fn default_directive(config: &ServerConfig) -> String {
    let level = if config.debug {
        "debug"
    } else {
        config.observability.log_level.as_str()
    };
    format!("graceful_web={level},tower_http={level}")
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(config).into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.observability.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_level() {
        let mut config = ServerConfig::default();
        assert_eq!(default_directive(&config), "graceful_web=info,tower_http=info");

        config.debug = true;
        assert_eq!(default_directive(&config), "graceful_web=debug,tower_http=debug");
    }
}
