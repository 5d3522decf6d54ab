#![allow(clippy::unwrap_used, clippy::expect_used)]

use alertbridge::server::router;
use alertbridge::types::{AlertBatch, AlertStatus};
use async_channel::unbounded;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

#[tokio::test]
async fn valid_payload_is_queued_and_acknowledged() {
    let (tx, rx) = unbounded::<AlertBatch>();
    let server = TestServer::new(router(tx)).expect("test server");

    let response = server
        .post("/webhook")
        .json(&json!({
            "version": "4",
            "status": "firing",
            "alerts": [
                {
                    "status": "firing",
                    "labels": {"alertname": "HighCpu", "instance": "node-1", "panel_id": "4"},
                    "annotations": {"description": "cpu above 90%"},
                    "startsAt": "2024-05-01T10:00:00Z"
                },
                {
                    "status": "resolved",
                    "labels": {"alertname": "DiskFull", "instance": "node-2"},
                    "startsAt": "2024-05-01T09:00:00Z"
                }
            ]
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body, json!({"status": "success", "message": "alert batch queued"}));

    let batch = rx.try_recv().expect("queued batch");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.alerts[0].panel_id(), Some("4"));
    assert_eq!(batch.alerts[1].status, AlertStatus::Resolved);
    assert!(rx.is_empty());
}

#[tokio::test]
async fn non_json_body_is_a_500_with_error_body() {
    let (tx, rx) = unbounded::<AlertBatch>();
    let server = TestServer::new(router(tx)).expect("test server");

    let response = server.post("/webhook").text("definitely not json").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(rx.is_empty());
}

#[tokio::test]
async fn missing_alerts_key_is_an_empty_batch() {
    let (tx, rx) = unbounded::<AlertBatch>();
    let server = TestServer::new(router(tx)).expect("test server");

    let response = server.post("/webhook").json(&json!({"receiver": "feishu"})).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(rx.try_recv().expect("queued batch").is_empty());
}

#[tokio::test]
async fn closed_queue_is_reported_as_error() {
    let (tx, rx) = unbounded::<AlertBatch>();
    let server = TestServer::new(router(tx)).expect("test server");
    rx.close();

    let response = server.post("/webhook").json(&json!({"alerts": []})).await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn health_reports_healthy() {
    let (tx, _rx) = unbounded::<AlertBatch>();
    let server = TestServer::new(router(tx)).expect("test server");

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}
