use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};
use tower::ServiceExt;

use cartpulse_core::config::Config;
use cartpulse_duckdb::DuckDbBackend;
use cartpulse_server::app::build_app;
use cartpulse_server::fanout::ShopMessage;
use cartpulse_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/cartpulse-test".to_string(),
        cors_origins: vec![],
        staleness_secs: 300,
        duckdb_memory_limit: "1GB".to_string(),
    }
}

/// Fresh in-memory backend + state + app per test; the background refresh
/// loop runs so write-path touches behave as in production.
async fn setup() -> (Arc<AppState>, axum::Router) {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let state = Arc::new(AppState::new(db, test_config()));
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_refresh_loop().await;
        });
    }
    let app = build_app(Arc::clone(&state));
    (state, app)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

fn abandonment_body(shop_id: &str, cart_value: f64) -> Value {
    json!({
        "shopId": shop_id,
        "sessionId": "sess_1",
        "cartValue": cart_value,
        "cartItems": [
            { "title": "Widget", "quantity": 1, "unitPrice": cart_value }
        ],
        "deviceType": "mobile",
        "trafficSource": "google"
    })
}

async fn track_abandonment(app: &axum::Router, shop_id: &str, cart_value: f64) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/revenue/track-abandonment",
            abandonment_body(shop_id, cart_value),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    body["eventId"].as_str().expect("eventId").to_string()
}

#[tokio::test]
async fn track_abandonment_persists_an_unrecovered_event() {
    let (state, app) = setup().await;
    let event_id = track_abandonment(&app, "shop_1", 49.99).await;

    let stored = state
        .db
        .fetch_abandonment("shop_1", &event_id)
        .await
        .expect("fetch")
        .expect("present");
    assert!(!stored.recovered);
    assert!(stored.recovered_at.is_none());
}

#[tokio::test]
async fn track_abandonment_rejects_empty_cart() {
    let (_state, app) = setup().await;
    let mut body = abandonment_body("shop_1", 10.0);
    body["cartItems"] = json!([]);

    let response = app
        .oneshot(post_json("/api/revenue/track-abandonment", body))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], json!("validation_error"));
}

#[tokio::test]
async fn track_abandonment_rejects_negative_cart_value() {
    let (_state, app) = setup().await;
    let response = app
        .oneshot(post_json(
            "/api/revenue/track-abandonment",
            abandonment_body("shop_1", -5.0),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn track_recovery_marks_parent_and_stores_one_recovery() {
    let (state, app) = setup().await;
    let event_id = track_abandonment(&app, "shop_1", 50.0).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/revenue/track-recovery",
            json!({
                "cartAbandonmentId": event_id,
                "shopId": "shop_1",
                "recoveryValue": 45.0,
                "recoveryMethod": "exit_popup"
            }),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert!(body["recoveryId"].is_string());

    let stored = state
        .db
        .fetch_abandonment("shop_1", &event_id)
        .await
        .expect("fetch")
        .expect("present");
    assert!(stored.recovered);
    assert!(stored.recovered_at.is_some());

    let recoveries = state
        .db
        .recoveries_for("shop_1", &event_id)
        .await
        .expect("recoveries");
    assert_eq!(recoveries.len(), 1);
}

#[tokio::test]
async fn track_recovery_unknown_abandonment_returns_404() {
    let (_state, app) = setup().await;
    let response = app
        .oneshot(post_json(
            "/api/revenue/track-recovery",
            json!({
                "cartAbandonmentId": "missing",
                "shopId": "shop_1",
                "recoveryValue": 45.0,
                "recoveryMethod": "exit_popup"
            }),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], json!("not_found"));
}

#[tokio::test]
async fn repeat_recovery_returns_409_and_no_duplicate() {
    let (state, app) = setup().await;
    let event_id = track_abandonment(&app, "shop_1", 50.0).await;
    let body = json!({
        "cartAbandonmentId": event_id,
        "shopId": "shop_1",
        "recoveryValue": 45.0,
        "recoveryMethod": "exit_popup"
    });

    let first = app
        .clone()
        .oneshot(post_json("/api/revenue/track-recovery", body.clone()))
        .await
        .expect("request");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .clone()
        .oneshot(post_json("/api/revenue/track-recovery", body))
        .await
        .expect("request");
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let second_body = json_body(second).await;
    assert_eq!(second_body["error"]["code"], json!("conflict"));

    let recoveries = state
        .db
        .recoveries_for("shop_1", &event_id)
        .await
        .expect("recoveries");
    assert_eq!(recoveries.len(), 1);
}

#[tokio::test]
async fn abandonment_fans_out_to_shop_subscribers() {
    let (state, app) = setup().await;
    let mut rx = state.hub.subscribe("shop_1").await;

    track_abandonment(&app, "shop_1", 49.99).await;

    let msg = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("fan-out within deadline")
        .expect("receive");
    match msg {
        ShopMessage::CartAbandoned { value, items, .. } => {
            assert_eq!(value.to_string(), "49.99");
            assert_eq!(items.len(), 1);
        }
        other => panic!("expected cart_abandoned, got {other:?}"),
    }
}

#[tokio::test]
async fn recovery_fans_out_event_then_fresh_stats() {
    let (state, app) = setup().await;
    let event_id = track_abandonment(&app, "shop_1", 50.0).await;

    let mut rx = state.hub.subscribe("shop_1").await;
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/revenue/track-recovery",
            json!({
                "cartAbandonmentId": event_id,
                "shopId": "shop_1",
                "recoveryValue": 45.0,
                "recoveryMethod": "exit_popup"
            }),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let first = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("fan-out within deadline")
        .expect("receive");
    assert!(matches!(first, ShopMessage::CartRecovered { .. }));

    // The background refresh announces the recomputed today window.
    let second = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("stats update within deadline")
        .expect("receive");
    match second {
        ShopMessage::StatsUpdated { stats } => {
            assert_eq!(stats.recovered.to_string(), "45.00");
            assert_eq!(stats.recovery_rate, 100.0);
        }
        other => panic!("expected stats_updated, got {other:?}"),
    }
}

#[tokio::test]
async fn other_shops_do_not_receive_the_fan_out() {
    let (state, app) = setup().await;
    let mut rx = state.hub.subscribe("shop_2").await;

    track_abandonment(&app, "shop_1", 10.0).await;

    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}
