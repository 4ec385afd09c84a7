//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Wrap the user router in the standard middleware stack
//! - Bind the listener and install signal handling
//! - Serve until the listener is closed by the shutdown sequence
//! - Keep the caller blocked until every exit hook has run
//!
//! # Design Decisions
//! - The gate is armed before the watcher exists, so no signal can race it
//! - A watcher panic is resumed on the caller, never swallowed

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Body, middleware, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutBody, TimeoutLayer},
    trace::TraceLayer,
    ServiceBuilderExt,
};

use crate::config::ServerConfig;
use crate::http::middleware::{recovery_layer, request_log_middleware, RequestLogger};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::{
    GateError, ListenerCloser, OsSignals, ProcessGate, ShutdownOrchestrator, ShutdownPlan,
    SignalWatcher, TerminationSource,
};
use crate::net::{self, ListenerError};
use crate::security::{rate_limit_middleware, RateLimiterState};

/// Error type for serving.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The signal source went away before a shutdown ran.
    #[error("Shutdown abandoned before exit hooks completed")]
    ShutdownAbandoned,
}

/// HTTP server with graceful, hook-driven shutdown.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    plan: ShutdownPlan,
}

impl HttpServer {
    /// Create a server for `routes`.
    ///
    /// The plan's drain policy wins over the configured one when both are set.
    pub fn new(config: ServerConfig, routes: Router, plan: ShutdownPlan) -> Self {
        let plan = plan.with_default_drain_policy(config.drain_policy);
        let router = Self::build_router(&config, routes);
        Self {
            router,
            config,
            plan,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, routes: Router) -> Router {
        // The body timeout and its body-type mapping must share one layer.
        let read_timeout = ServiceBuilder::new()
            .layer(RequestBodyTimeoutLayer::new(config.read_timeout()))
            .map_request_body(|body: TimeoutBody<Body>| Body::new(body));

        let mut router = routes
            .layer(read_timeout)
            .layer(TimeoutLayer::new(config.write_timeout()));

        if let Some(rate_limit) = config.active_rate_limit() {
            let state = Arc::new(RateLimiterState::new(rate_limit));
            router = router.layer(middleware::from_fn_with_state(state, rate_limit_middleware));
        }

        router
            .layer(middleware::from_fn_with_state(
                RequestLogger::new(&config.request_log),
                request_log_middleware,
            ))
            .layer(recovery_layer())
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Bind the configured address and serve until a termination signal
    /// has been fully handled.
    pub async fn serve(self) -> Result<(), ServeError> {
        let listener = net::bind(&self.config.bind_address).await?;
        let signals = OsSignals::install().map_err(ServeError::Signals)?;
        self.run(listener, signals).await
    }

    /// Serve on `listener`, shutting down when `source` asks to.
    ///
    /// Returns only after the shutdown sequence released the gate.
    pub async fn run<S>(self, listener: TcpListener, source: S) -> Result<(), ServeError>
    where
        S: TerminationSource + 'static,
    {
        let addr = listener.local_addr().map_err(ServeError::Serve)?;

        let closer = ListenerCloser::new();
        let (release, waiter) = ProcessGate::arm();
        let orchestrator = Arc::new(ShutdownOrchestrator::new(
            self.plan,
            self.config.grace_period(),
            closer.clone(),
            release,
        ));
        let watcher = tokio::spawn(SignalWatcher::new(source, orchestrator).run());

        tracing::info!(
            address = %addr,
            grace = ?self.config.grace_period(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(closer.closed())
            .await
        {
            watcher.abort();
            return Err(ServeError::Serve(e));
        }

        tracing::info!("HTTP server stopped, waiting for exit hooks");
        match waiter.wait().await {
            Ok(()) => {}
            Err(GateError::Abandoned) => {
                return match watcher.await {
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    _ => Err(ServeError::ShutdownAbandoned),
                };
            }
        }

        tracing::info!("Process exit");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
