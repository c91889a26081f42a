use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::handler::Handler;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::routing::post;
use axum::{Extension, Json, Router, middleware};
use axum_test::TestServer;
use serde::Serialize;
use serde_json::{Value, json};

use paygate_payments::domain::types::{IDEMPOTENCY_KEY_HEADER, IdempotencyKey};
use paygate_payments::error::PaymentsServiceError;
use paygate_payments::middleware::{MAX_RECORDED_BODY_BYTES, enforce_idempotency};
use paygate_payments::usecase::idempotency::{IdempotencyGate, RecordOutcome};

use crate::helpers::MockIdempotencyRepo;

/// Counts handler executions and fails on demand.
#[derive(Clone, Default)]
struct HandlerCalls {
    count: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

fn serve_gated<H, T>(repo: MockIdempotencyRepo, handler: H) -> TestServer
where
    H: Handler<T, ()>,
    T: 'static,
{
    let gate = Arc::new(IdempotencyGate::new(repo));
    let app = Router::new().route(
        "/api/payments",
        post(handler).layer(middleware::from_fn_with_state(
            gate,
            enforce_idempotency::<MockIdempotencyRepo>,
        )),
    );
    TestServer::new(app).unwrap()
}

fn gated_server(repo: MockIdempotencyRepo, calls: &HandlerCalls) -> TestServer {
    let calls = calls.clone();
    let handler = move |Extension(key): Extension<IdempotencyKey>| {
        let calls = calls.clone();
        async move {
            let n = calls.count.fetch_add(1, Ordering::SeqCst) + 1;
            if calls.fail.load(Ordering::SeqCst) {
                return Err(PaymentsServiceError::Provider(anyhow::anyhow!(
                    "quote rejected"
                )));
            }
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "paymentId": format!("pay-{n}"), "key": key.as_str(), "status": "processing" })),
            ))
        }
    };
    serve_gated(repo, handler)
}

fn key_header(key: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
        HeaderValue::from_static(key),
    )
}

#[tokio::test]
async fn should_replay_recorded_response_without_rerunning_handler() {
    let repo = MockIdempotencyRepo::empty();
    let records = repo.records_handle();
    let calls = HandlerCalls::default();
    let server = gated_server(repo, &calls);

    let (name, value) = key_header("k1");
    let first = server
        .post("/api/payments")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "amount": 100 }))
        .await;
    assert_eq!(first.status_code(), StatusCode::ACCEPTED);

    let second = server
        .post("/api/payments")
        .add_header(name, value)
        .json(&json!({ "amount": 100 }))
        .await;
    assert_eq!(second.status_code(), StatusCode::OK);

    assert_eq!(second.text(), first.text(), "replay must return the recorded body");
    assert_eq!(calls.count.load(Ordering::SeqCst), 1, "handler must run once");
    assert_eq!(records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_reject_request_without_idempotency_key() {
    let repo = MockIdempotencyRepo::empty();
    let records = repo.records_handle();
    let calls = HandlerCalls::default();
    let server = gated_server(repo, &calls);

    let response = server
        .post("/api/payments")
        .json(&json!({ "amount": 100 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>(),
        json!({ "error": "Idempotency key required" })
    );
    assert_eq!(calls.count.load(Ordering::SeqCst), 0);
    assert!(records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_treat_blank_key_as_missing() {
    let calls = HandlerCalls::default();
    let server = gated_server(MockIdempotencyRepo::empty(), &calls);

    let (name, value) = key_header("   ");
    let response = server
        .post("/api/payments")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(calls.count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn should_not_record_failed_execution() {
    let repo = MockIdempotencyRepo::empty();
    let records = repo.records_handle();
    let calls = HandlerCalls::default();
    calls.fail.store(true, Ordering::SeqCst);
    let server = gated_server(repo, &calls);

    let (name, value) = key_header("k-fail");
    let failed = server
        .post("/api/payments")
        .add_header(name.clone(), value.clone())
        .json(&json!({}))
        .await;
    assert_eq!(failed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        failed.json::<Value>(),
        json!({ "error": "Payment processing failed" })
    );
    assert!(records.lock().unwrap().is_empty(), "failures are not memoized");

    // The same key can be retried once the provider recovers.
    calls.fail.store(false, Ordering::SeqCst);
    let retried = server
        .post("/api/payments")
        .add_header(name, value)
        .json(&json!({}))
        .await;
    assert_eq!(retried.status_code(), StatusCode::ACCEPTED);
    assert_eq!(calls.count.load(Ordering::SeqCst), 2);
    assert_eq!(records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_fail_without_running_handler_when_lookup_fails() {
    let repo = MockIdempotencyRepo {
        fail_lookup: true,
        ..MockIdempotencyRepo::default()
    };
    let calls = HandlerCalls::default();
    let server = gated_server(repo, &calls);

    let (name, value) = key_header("k-down");
    let response = server
        .post("/api/payments")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(calls.count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn should_return_handler_response_when_record_loses_race() {
    let repo = MockIdempotencyRepo {
        lose_race: true,
        ..MockIdempotencyRepo::default()
    };
    let calls = HandlerCalls::default();
    let server = gated_server(repo, &calls);

    let (name, value) = key_header("k-race");
    let response = server
        .post("/api/payments")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>()["paymentId"], "pay-1");
}

#[tokio::test]
async fn should_return_handler_response_when_record_fails() {
    let repo = MockIdempotencyRepo {
        fail_insert: true,
        ..MockIdempotencyRepo::default()
    };
    let calls = HandlerCalls::default();
    let server = gated_server(repo, &calls);

    let (name, value) = key_header("k-unrecorded");
    let response = server
        .post("/api/payments")
        .add_header(name, value)
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn should_report_record_outcomes() {
    let gate = IdempotencyGate::new(MockIdempotencyRepo::empty());
    let key = IdempotencyKey::parse(Some("k-outcome")).unwrap();

    let first = gate.record(&key, json!({ "paymentId": "a" })).await;
    let second = gate.record(&key, json!({ "paymentId": "b" })).await;

    assert_eq!(first, RecordOutcome::Recorded);
    assert_eq!(
        second,
        RecordOutcome::LostRace,
        "second record of a key must keep the first response"
    );
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accepted {
    status: &'static str,
    payment_id: &'static str,
    amount: f64,
}

#[tokio::test]
async fn should_replay_identical_bytes_for_unsorted_fields() {
    let server = serve_gated(MockIdempotencyRepo::empty(), || async {
        (
            StatusCode::ACCEPTED,
            Json(Accepted {
                status: "processing",
                payment_id: "pay-1",
                amount: 100.5,
            }),
        )
    });

    let (name, value) = key_header("k-order");
    let first = server
        .post("/api/payments")
        .add_header(name.clone(), value.clone())
        .await;
    let second = server.post("/api/payments").add_header(name, value).await;

    assert_eq!(first.status_code(), StatusCode::ACCEPTED);
    assert_eq!(second.status_code(), StatusCode::OK);
    assert_eq!(first.text(), second.text());
}

#[tokio::test]
async fn should_pass_oversized_response_through_unrecorded() {
    let repo = MockIdempotencyRepo::empty();
    let records = repo.records_handle();
    let filler = "x".repeat(MAX_RECORDED_BODY_BYTES + 1);
    let expected = filler.len();
    let server = serve_gated(repo, move || {
        let filler = filler.clone();
        async move { (StatusCode::ACCEPTED, Json(json!({ "filler": filler }))) }
    });

    let (name, value) = key_header("k-large");
    let response = server.post("/api/payments").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>()["filler"].as_str().map(str::len), Some(expected));
    assert!(records.lock().unwrap().is_empty(), "oversized bodies are not recorded");
}
