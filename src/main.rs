//! Graceful web service (v1)
//!
//! Runs a small demo service on top of the library so the shutdown
//! sequence can be exercised end to end with `kill -TERM`.
//!
//! # Shutdown Overview
//!
//! ```text
//!     SIGTERM / SIGINT / SIGQUIT
//!            │
//!            ▼
//!     ┌──────────────┐    ┌───────────────────┐    ┌──────────────────┐
//!     │ close        │───▶│ pre-drain hooks   │───▶│ post-drain hooks │───▶ exit
//!     │ listener     │    │ (grace period)    │    │ (run to the end) │
//!     └──────────────┘    └───────────────────┘    └──────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;

use graceful_web::config::{load_config, ServerConfig};
use graceful_web::http::middleware::{access_log_middleware, cors_middleware, AccessLog};
use graceful_web::http::json;
use graceful_web::lifecycle::{Hook, HookContext, ShutdownPlan};
use graceful_web::observability::{logging, metrics};
use graceful_web::HttpServer;

#[derive(Parser)]
#[command(name = "graceful-web")]
#[command(about = "HTTP service with hook-driven graceful shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address from the config.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    logging::init_logging(&config);
    tracing::info!("graceful-web v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.bind_address,
        read_timeout = ?config.read_timeout(),
        write_timeout = ?config.write_timeout(),
        drain_policy = ?config.drain_policy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let plan = ShutdownPlan::builder()
        .on_shutdown([Hook::named("drain-notice", drain_notice)])
        .on_exit([Hook::named("flush", |_ctx| async {
            tracing::info!("Flushing before exit");
        })])
        .build();

    HttpServer::new(config, routes(), plan).serve().await?;
    Ok(())
}

fn routes() -> Router {
    let api = Router::new()
        .route("/echo", post(|body: String| async move { json(Some(body), Ok(())) }))
        .layer(middleware::from_fn_with_state(
            AccessLog::new("graceful-web"),
            access_log_middleware,
        ));

    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/health", get(|| async { json::<()>(None, Ok(())) }))
        .nest("/api", api)
        .layer(middleware::from_fn(cors_middleware))
}

/// Give in-flight work a moment, but never past the grace deadline.
async fn drain_notice(ctx: HookContext) {
    tracing::info!(remaining = ?ctx.remaining(), "Draining in-flight requests");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        _ = ctx.cancelled() => tracing::warn!("Grace period ended during drain notice"),
    }
}
