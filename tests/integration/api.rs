//! HTTP API tests

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use holmes_playbooks::api::{build_router, AppState};
use holmes_playbooks::integrations::CollectingSink;
use holmes_playbooks::playbooks::PlaybookRegistry;

use super::support::{context, waiting_pod, FakeCluster, MockHolmes};

async fn app(sink: &CollectingSink) -> (Router, MockHolmes) {
    let holmes = MockHolmes::start(MockHolmes::analysis("Wrong image tag.")).await;
    let cluster = Arc::new(FakeCluster {
        pods: vec![waiting_pod("api-0", "prod", "ErrImagePull", 0)],
        ..Default::default()
    });
    let ctx = context(holmes.client(), cluster, sink);
    let state = AppState::new(PlaybookRegistry::with_builtins(&HashMap::new()), ctx);
    (build_router(state, true), holmes)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _holmes) = app(&CollectingSink::new()).await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_list_playbooks() {
    let (app, _holmes) = app(&CollectingSink::new()).await;
    let (status, body) = send(app, "GET", "/api/playbooks", None).await;

    assert_eq!(status, StatusCode::OK);
    let playbooks = body["data"].as_array().unwrap();
    assert_eq!(playbooks.len(), 5);
    assert!(playbooks
        .iter()
        .any(|p| p["name"] == "holmes_node_issue" && p["trigger"] == "node"));
}

#[tokio::test]
async fn test_trigger_returns_finding() {
    let sink = CollectingSink::new();
    let (app, holmes) = app(&sink).await;
    let (status, body) = send(
        app,
        "POST",
        "/api/playbooks/holmes_pod_issue/trigger",
        Some(json!({"kind": "Pod", "name": "api-0", "namespace": "prod"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let finding = &body["data"]["finding"];
    assert_eq!(finding["aggregationKey"], "HolmesGPT_prod_api-0");
    assert_eq!(finding["title"], "🔍 ImagePullBackOff - HolmesGPT: prod/api-0");
    assert_eq!(finding["source"], "kubernetes_api_server");
    assert_eq!(sink.len(), 1);
    assert_eq!(holmes.requests().len(), 1);
}

#[tokio::test]
async fn test_trigger_missing_resource_returns_null() {
    let sink = CollectingSink::new();
    let (app, holmes) = app(&sink).await;
    let (status, body) = send(
        app,
        "POST",
        "/api/playbooks/holmes_pod_issue/trigger",
        Some(json!({"kind": "Pod", "name": "gone", "namespace": "prod"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["finding"].is_null());
    assert!(sink.is_empty());
    assert!(holmes.requests().is_empty());
}

#[tokio::test]
async fn test_unknown_playbook_is_404() {
    let (app, _holmes) = app(&CollectingSink::new()).await;
    let (status, body) = send(
        app,
        "POST",
        "/api/playbooks/no_such_playbook/trigger",
        Some(json!({"kind": "Pod", "name": "api-0", "namespace": "prod"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_event_kind_mismatch_is_400() {
    let sink = CollectingSink::new();
    let (app, _holmes) = app(&sink).await;
    let pod = serde_json::to_value(waiting_pod("api-0", "prod", "ErrImagePull", 0)).unwrap();
    let event = json!({ "pod": pod });
    let (status, body) =
        send(app, "POST", "/api/playbooks/holmes_node_issue/event", Some(event)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "TRIGGER_MISMATCH");
    assert_eq!(body["error"]["details"]["expected"], "node");
    assert_eq!(body["error"]["details"]["actual"], "pod");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_pushed_event_runs_playbook() {
    let sink = CollectingSink::new();
    let (app, holmes) = app(&sink).await;
    let event = json!({"resource": {"kind": "StatefulSet", "name": "db", "namespace": "data"}});
    let (status, body) =
        send(app, "POST", "/api/playbooks/holmes_resource_issue/event", Some(event)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["finding"]["source"], "webhook");
    assert_eq!(body["data"]["finding"]["aggregationKey"], "HolmesGPT_data_db");
    assert_eq!(holmes.requests()[0].0, "/api/investigate");
}
