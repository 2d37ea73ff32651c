#![cfg(feature = "web")]
//! Web handler integration tests.
//!
//! Tests cover:
//! - POST /check returns the check output with its own status code
//! - Rejected and failed checks map to 400 and 500
//! - GET /health lists the registered exchanges
//! - Unknown routes answer with a JSON 404

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::*;
use http_body_util::BodyExt;
use signalcheck::adapters::memory_adapter::InMemoryExchange;
use signalcheck::adapters::web::{AppState, build_router};
use signalcheck::domain::signal::Signal;
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app(exchange: InMemoryExchange) -> Router {
    build_router(AppState {
        exchanges: Arc::new(registry(exchange)),
        options: options(),
    })
}

fn default_app() -> Router {
    create_test_app(exchange_with(vec![flat(0, 1.0), candle(1, 4.0, 5.0), flat(2, 6.0)]))
}

async fn post_check(app: Router, body: String) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/check")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn check_returns_event_log() {
    let body = serde_json::to_string(&long_signal()).unwrap();
    let (status, json) = post_check(default_app(), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isError"], false);
    assert_eq!(json["httpStatus"], 200);
    assert_eq!(json["entered"], true);
    let events = json["events"].as_array().unwrap();
    let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["entered", "took_profit", "took_profit"]);
    assert_eq!(json["highestTakeProfit"], 2);
    assert!(json.get("maxEnterUSD").is_none());
}

#[tokio::test]
async fn check_accepts_camel_case_request() {
    let body = format!(
        r#"{{
            "baseAsset": "eth",
            "quoteAsset": "usdt",
            "entries": [2.0, 1.0],
            "takeProfits": [5.0, 6.0],
            "takeProfitRatios": [0.5, 0.5],
            "stopLoss": 0.5,
            "ifTP1StopAtEntry": true,
            "initialTime": "{}",
            "dontCalculateMaxEnterUSD": true
        }}"#,
        at(START).to_rfc3339()
    );
    let (status, json) = post_check(default_app(), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["input"]["baseAsset"], "ETH");
    assert_eq!(json["input"]["exchange"], "binance");
}

#[tokio::test]
async fn invalid_signal_is_bad_request() {
    let signal = Signal {
        entries: vec![1.0, 2.0],
        ..long_signal()
    };
    let (status, json) = post_check(default_app(), serde_json::to_string(&signal).unwrap()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["isError"], true);
    assert_eq!(json["httpStatus"], 400);
    assert!(json["errorMessage"].as_str().unwrap().contains("entries"));
}

#[tokio::test]
async fn upstream_failure_is_server_error_with_partial_log() {
    let exchange = exchange_with(vec![flat(0, 1.5), flat(1, 1.6)])
        .with_failure_after(eth_usdt(), 1, "connection reset");
    let body = serde_json::to_string(&long_signal()).unwrap();
    let (status, json) = post_check(create_test_app(exchange), body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn health_lists_exchanges() {
    let (status, json) = get(default_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["exchanges"], serde_json::json!(["binance"]));
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let (status, json) = get(default_app(), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["isError"], true);
    assert_eq!(json["httpStatus"], 404);
}
