//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use graceful_web::config::ServerConfig;
use graceful_web::lifecycle::{ChannelSource, Hook, SignalTrigger};
use graceful_web::{HttpServer, ServeError, ShutdownPlan};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A server running on an ephemeral port with an in-process signal source.
pub struct TestServer {
    pub addr: SocketAddr,
    pub trigger: SignalTrigger,
    pub handle: JoinHandle<Result<(), ServeError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config with a short grace period so shutdown tests stay fast.
#[allow(dead_code)]
pub fn fast_config() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        read_timeout_secs: 1,
        write_timeout_secs: 5,
        ..ServerConfig::default()
    }
}

/// Start `routes` behind a full `HttpServer`.
pub async fn start_server(config: ServerConfig, routes: Router, plan: ShutdownPlan) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (trigger, source) = ChannelSource::channel();

    let server = HttpServer::new(config, routes, plan);
    let handle = tokio::spawn(server.run(listener, source));

    TestServer {
        addr,
        trigger,
        handle,
    }
}

/// Ordered record of hook executions.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl EventLog {
    pub fn push(&self, event: &str) {
        self.0.lock().unwrap().push(event.to_string());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// A hook that appends `name` when it runs.
    pub fn hook(&self, name: &'static str) -> Hook {
        let log = self.clone();
        Hook::named(name, move |_ctx| {
            let log = log.clone();
            async move { log.push(name) }
        })
    }
}

/// Start a programmable mock backend speaking raw HTTP/1.1.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            _ => "200 OK",
                        };

                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
