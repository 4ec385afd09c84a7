//! Forwarding through a live server to a mock upstream.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    routing::{any, get},
    Json, Router,
};
use graceful_web::http::{Forwarder, ProxyError};
use graceful_web::lifecycle::TerminationSignal;
use graceful_web::ShutdownPlan;
use serde::Deserialize;

mod common;
use common::{fast_config, start_programmable_backend, start_server};

#[derive(Debug, Deserialize)]
struct Balance {
    account: String,
    amount: i64,
}

#[tokio::test]
async fn server_relays_to_upstream() {
    let upstream = start_programmable_backend(|| async {
        (200, r#"{"code":0,"message":"success","data":{"account":"a-1","amount":42}}"#.to_string())
    })
    .await;
    let forwarder = Forwarder::new(&format!("http://{}", upstream)).unwrap();

    let routes = Router::new()
        .route(
            "/relay/{*rest}",
            any(|State(fwd): State<Forwarder>, req: Request<Body>| async move { fwd.forward(req).await }),
        )
        .route(
            "/balance",
            get(|State(fwd): State<Forwarder>, req: Request<Body>| async move {
                match fwd.fetch::<Balance>(req, None, Some("/internal/balance")).await {
                    Ok(b) => Json(serde_json::json!({"account": b.account, "amount": b.amount})),
                    Err(e) => Json(serde_json::json!({"error": e.to_string()})),
                }
            }),
        )
        .with_state(forwarder);

    let server = start_server(fast_config(), routes, ShutdownPlan::empty()).await;
    let client = reqwest::Client::new();

    let relayed = client.get(server.url("/relay/anything")).send().await.unwrap();
    assert_eq!(relayed.status(), StatusCode::OK);
    let body: serde_json::Value = relayed.json().await.unwrap();
    assert_eq!(body["data"]["amount"], 42);

    let balance: serde_json::Value = client
        .get(server.url("/balance"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(balance, serde_json::json!({"account": "a-1", "amount": 42}));

    server.trigger.send(TerminationSignal::Terminate);
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn fetch_surfaces_upstream_failure() {
    let upstream = start_programmable_backend(|| async { (502, "bad gateway".to_string()) }).await;
    let forwarder = Forwarder::new(&format!("http://{}", upstream)).unwrap();

    let request = Request::builder().uri("/x").body(Body::empty()).unwrap();
    match forwarder.fetch::<Balance>(request, None, None).await {
        Err(ProxyError::Status { status, body }) => {
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}
