//! End-to-end behaviour of the HTTP ingress over in-memory storage.

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chronicle_engine::HostConfig;
use chronicle_id::{Address, CorrelationId, EventId};
use chronicle_journal::{Snapshot, SnapshotStore};
use chronicle_silo::{api, state::AppState};
use chronicle_testing::{init_tracing, Fixture};
use serde_json::{json, Value};
use tower::ServiceExt;

fn silo(fixture: &Fixture) -> (AppState, Router) {
    let state = AppState::with_storage(
        fixture.journals.clone(),
        fixture.snapshots.clone(),
        HostConfig::default(),
        None,
    );
    let app = api::create_router(state.clone());
    (state, app)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn invoke(app: &Router, to: &Address, method: &str, args: Value) -> (StatusCode, Value) {
    send(
        app,
        post(
            "/v1/invoke",
            json!({ "to": to.to_string(), "type": method, "args": args }),
        ),
    )
    .await
}

fn history_uri(address: &Address, query: &str) -> String {
    format!(
        "/v1/actors/{}/{}/history{query}",
        address.kind(),
        address.id().simple()
    )
}

#[tokio::test]
async fn test_calculator_scenario() {
    init_tracing();
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);
    let calc = Address::random("calculator").unwrap();

    let (status, body) = invoke(&app, &calc, "set", json!([5])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(5.0));
    assert_eq!(invoke(&app, &calc, "add", json!([3])).await.1["result"], json!(8.0));
    assert_eq!(
        invoke(&app, &calc, "Multiply", json!([2])).await.1["result"],
        json!(16.0)
    );
    assert_eq!(invoke(&app, &calc, "get", json!([])).await.1["result"], json!(16.0));

    let (status, body) = send(&app, get(&history_uri(&calc, ""))).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    let summary: Vec<(i64, &str, Value)> = items
        .iter()
        .map(|e| {
            (
                e["id"].as_i64().unwrap(),
                e["type"].as_str().unwrap(),
                e["args"].clone(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, "set", json!([5.0])),
            (2, "add", json!([3.0])),
            (3, "multiply", json!([2.0])),
        ]
    );
    assert_eq!(body["next_after"], json!(3));
}

#[tokio::test]
async fn test_rejected_command_is_422_and_not_journaled() {
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);
    let calc = Address::random("calculator").unwrap();
    invoke(&app, &calc, "set", json!([4])).await;

    let (status, problem) = invoke(&app, &calc, "divide", json!([0])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(problem["code"], json!("rejected"));
    assert_eq!(problem["retryable"], json!(false));
    assert!(problem["detail"]
        .as_str()
        .unwrap()
        .contains("cannot divide by zero"));

    let (_, body) = send(&app, get(&history_uri(&calc, ""))).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(invoke(&app, &calc, "get", json!([])).await.1["result"], json!(4.0));
}

#[tokio::test]
async fn test_malformed_commands() {
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);
    let calc = Address::random("calculator").unwrap();

    let cases = [
        (
            json!({ "to": calc.to_string(), "type": "sqrt", "args": [4] }),
            StatusCode::NOT_FOUND,
            "unknown_type",
        ),
        (
            json!({ "to": calc.to_string(), "type": "add", "args": [1, 2] }),
            StatusCode::BAD_REQUEST,
            "invalid_arguments",
        ),
        (
            json!({ "to": calc.to_string(), "type": "add", "args": ["one"] }),
            StatusCode::BAD_REQUEST,
            "invalid_arguments",
        ),
        (
            json!({ "to": "abacus/6f1c1a2b3c4d4e5f8a9b0c1d2e3f4a5b", "type": "add", "args": [1] }),
            StatusCode::NOT_FOUND,
            "unknown_type",
        ),
        (
            json!({ "type": "add", "args": [1] }),
            StatusCode::BAD_REQUEST,
            "format_error",
        ),
        (
            json!({ "to": "calculator/not-an-id", "type": "add", "args": [1] }),
            StatusCode::BAD_REQUEST,
            "format_error",
        ),
    ];

    for (command, status, code) in cases {
        let (actual, problem) = send(&app, post("/v1/invoke", command.clone())).await;
        assert_eq!(actual, status, "{command}");
        assert_eq!(problem["code"], json!(code), "{command}");
    }

    let (_, body) = send(&app, get(&history_uri(&calc, ""))).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_request_and_correlation_ids() {
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);
    let calc = Address::random("calculator").unwrap();
    let cid = CorrelationId::new();

    let request = Request::post("/v1/invoke")
        .header(CONTENT_TYPE, "application/json")
        .header("x-request-id", "req-42")
        .header("x-correlation-id", cid.to_string())
        .body(Body::from(
            json!({ "to": calc.to_string(), "type": "divide", "args": [0] }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let problem: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(problem["request_id"], json!("req-42"));

    let request = Request::post("/v1/invoke")
        .header(CONTENT_TYPE, "application/json")
        .header("x-correlation-id", cid.to_string())
        .body(Body::from(
            json!({ "to": calc.to_string(), "type": "set", "args": [1] }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get(&history_uri(&calc, ""))).await;
    assert_eq!(body["items"][0]["cid"], json!(cid.to_string()));
}

#[tokio::test]
async fn test_history_pages() {
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);
    let calc = Address::random("calculator").unwrap();
    for n in 1..=3 {
        invoke(&app, &calc, "add", json!([n])).await;
    }

    let (_, page) = send(&app, get(&history_uri(&calc, "?limit=2"))).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["next_after"], json!(2));

    let (_, page) = send(&app, get(&history_uri(&calc, "?after=2&limit=2"))).await;
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], json!(3));

    let (_, page) = send(&app, get(&history_uri(&calc, "?after=3"))).await;
    assert!(page["items"].as_array().unwrap().is_empty());
    assert_eq!(page["next_after"], json!(3));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let fixture = Fixture::new();
    let calc = Address::random("calculator").unwrap();

    let (state, app) = silo(&fixture);
    invoke(&app, &calc, "set", json!([10])).await;
    invoke(&app, &calc, "divide", json!([4])).await;
    state.ingress().shutdown().await;
    assert_eq!(fixture.snapshots.write_count(), 1);

    let (_, app) = silo(&fixture);
    assert_eq!(invoke(&app, &calc, "get", json!([])).await.1["result"], json!(2.5));
    assert_eq!(invoke(&app, &calc, "add", json!([1])).await.1["result"], json!(3.5));
    let (_, body) = send(&app, get(&history_uri(&calc, "?after=2"))).await;
    assert_eq!(body["items"][0]["id"], json!(3));
}

#[tokio::test]
async fn test_clear_resets_the_actor() {
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);
    let calc = Address::random("calculator").unwrap();
    invoke(&app, &calc, "set", json!([7])).await;

    let uri = format!("/v1/actors/calculator/{}/clear", calc.id().simple());
    let (status, _) = send(&app, post(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(invoke(&app, &calc, "get", json!([])).await.1["result"], json!(0.0));
    let (_, body) = send(&app, get(&history_uri(&calc, ""))).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_introspection_and_completion() {
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);

    let (status, body) = send(&app, get("/v1/actors")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["kind"], json!("calculator"));
    let divide = &body["items"][0]["methods"]["divide"];
    assert_eq!(divide["args"][0]["name"], json!("number"));
    assert_eq!(divide["args"][0]["type"], json!("f64"));
    assert_eq!(divide["journaled"], json!(true));

    let (_, body) = send(&app, get("/v1/complete?prefix=Ca")).await;
    assert_eq!(body["items"], json!(["calculator"]));

    let (_, body) = send(&app, get("/v1/complete?kind=calculator&prefix=m")).await;
    assert_eq!(body["items"], json!(["multiply"]));

    let (status, body) = send(&app, get("/v1/complete?kind=abacus")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("unknown_type"));
}

#[tokio::test]
async fn test_healthz() {
    let fixture = Fixture::new();
    let (_, app) = silo(&fixture);

    let (status, body) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["kinds"], json!(["calculator"]));
    assert!(body.get("storage").is_none());
}

#[tokio::test]
async fn test_overflow_is_rejected_and_survives_restart() {
    let fixture = Fixture::new();
    let calc = Address::random("calculator").unwrap();

    let (state, app) = silo(&fixture);
    invoke(&app, &calc, "set", json!([1e308])).await;
    let (status, problem) = invoke(&app, &calc, "multiply", json!([10])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(problem["code"], json!("rejected"));
    state.ingress().shutdown().await;

    let snapshot = fixture.snapshot(&calc).await.unwrap();
    assert_eq!(snapshot.state, json!({ "value": 1e308 }));

    let (_, app) = silo(&fixture);
    let (status, body) = invoke(&app, &calc, "get", json!([])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(1e308));
    let (status, body) = invoke(&app, &calc, "set", json!([1])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(1.0));
}

#[tokio::test]
async fn test_unreadable_snapshot_is_rebuilt_from_journal() {
    let fixture = Fixture::new();
    let calc = Address::random("calculator").unwrap();

    let (state, app) = silo(&fixture);
    invoke(&app, &calc, "set", json!([6])).await;
    invoke(&app, &calc, "divide", json!([4])).await;
    state.ingress().shutdown().await;

    // What an older build wrote for an infinite value.
    fixture
        .snapshots
        .write(&calc, &Snapshot::new(EventId::new(2), json!({ "value": null })))
        .await
        .unwrap();

    let (_, app) = silo(&fixture);
    let (status, body) = invoke(&app, &calc, "get", json!([])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], json!(1.5));
    assert_eq!(invoke(&app, &calc, "add", json!([1])).await.1["result"], json!(2.5));
    let (_, body) = send(&app, get(&history_uri(&calc, "?after=2"))).await;
    assert_eq!(body["items"][0]["id"], json!(3));
}
