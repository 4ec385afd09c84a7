//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::DrainPolicy;

/// Read/write timeout used when the config leaves one unset or zero.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:2233").
    pub bind_address: String,

    /// Request read timeout in seconds. Also the shutdown grace period.
    pub read_timeout_secs: u64,

    /// Response write timeout in seconds.
    pub write_timeout_secs: u64,

    /// Verbose logging.
    pub debug: bool,

    /// How long shutdown waits before running post-drain hooks.
    pub drain_policy: DrainPolicy,

    /// Optional per-client rate limiting.
    pub rate_limit: Option<RateLimitConfig>,

    /// Per-request log line settings.
    pub request_log: RequestLogConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:2233".to_string(),
            read_timeout_secs: DEFAULT_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_TIMEOUT_SECS,
            debug: false,
            drain_policy: DrainPolicy::Fixed,
            rate_limit: None,
            request_log: RequestLogConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(non_zero_or_default(self.read_timeout_secs))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(non_zero_or_default(self.write_timeout_secs))
    }

    /// Time pre-drain hooks get before post-drain hooks start.
    pub fn grace_period(&self) -> Duration {
        self.read_timeout()
    }

    /// Rate limit settings, if limiting is actually switched on.
    pub fn active_rate_limit(&self) -> Option<&RateLimitConfig> {
        self.rate_limit
            .as_ref()
            .filter(|rl| rl.requests_per_second != 0)
    }
}

fn non_zero_or_default(secs: u64) -> u64 {
    if secs == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        secs
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per second per client. Zero disables limiting.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Per-request log line configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestLogConfig {
    /// Emit a log line per request.
    pub enabled: bool,

    /// Paths that never produce a log line, on top of the built-in
    /// health-check paths.
    pub ignored_paths: Vec<String>,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignored_paths: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). Overridden by `debug`.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeouts_fall_back_to_default() {
        let config = ServerConfig {
            read_timeout_secs: 0,
            write_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert_eq!(config.write_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn grace_period_follows_read_timeout() {
        let config = ServerConfig {
            read_timeout_secs: 5,
            write_timeout_secs: 30,
            ..ServerConfig::default()
        };
        assert_eq!(config.grace_period(), Duration::from_secs(5));
    }

    #[test]
    fn rate_limit_requires_non_zero_rate() {
        let mut config = ServerConfig::default();
        assert!(config.active_rate_limit().is_none());

        config.rate_limit = Some(RateLimitConfig {
            requests_per_second: 0,
            burst_size: 10,
        });
        assert!(config.active_rate_limit().is_none());

        config.rate_limit = Some(RateLimitConfig::default());
        assert!(config.active_rate_limit().is_some());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            bind_address = "127.0.0.1:9000"
            drain_policy = "earliest_of"

            [rate_limit]
            requests_per_second = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.drain_policy, DrainPolicy::EarliestOf);
        assert_eq!(config.read_timeout_secs, 60);
        let rl = config.rate_limit.unwrap();
        assert_eq!(rl.requests_per_second, 5);
        assert_eq!(rl.burst_size, 50);
        assert!(config.request_log.enabled);
    }
}
