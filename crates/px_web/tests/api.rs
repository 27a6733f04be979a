use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use px_core::{ProgressEvent, ResultCache};
use px_pipeline::test_utils::{pipeline, record, ScriptedModel, StaticDiscovery, StaticRetrieval};
use px_pipeline::ChatService;
use px_progress::StreamerConfig;
use px_storage::MemoryStorage;
use px_web::{create_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    app: Router,
    store: Arc<MemoryStorage>,
}

fn harness(urls: Vec<String>, markers: &[&str]) -> Harness {
    let records = urls.iter().zip(markers).map(|(u, m)| record(u, m)).collect();
    let store = Arc::new(MemoryStorage::new());
    let model = Arc::new(ScriptedModel::default());
    let pipeline = pipeline(
        Arc::new(StaticDiscovery::new(urls)),
        Arc::new(StaticRetrieval::new(records)),
        model.clone(),
        store.clone(),
    )
    .unwrap();
    let chat = ChatService::new(model, store.clone());
    let config = StreamerConfig {
        heartbeat_interval: Duration::from_millis(5),
        ..StreamerConfig::default()
    };
    Harness {
        app: create_app(AppState::new(pipeline, chat, config)),
        store,
    }
}

fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://news.example/{}", i)).collect()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn analyze_returns_full_result() {
    let h = harness(urls(3), &["LEFT", "RIGHT", "CENTER"]);
    let response = h
        .app
        .oneshot(post("/api/analyze", json!({"topic": "Tariffs"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["topic"], "Tariffs");
    assert_eq!(body["bias_counts"], json!({"Left": 1, "Center": 1, "Right": 1}));
    assert_eq!(body["sources_count"], 3);
    assert_eq!(body["sources"].as_array().unwrap().len(), 3);
    assert!(body["narratives"]["Left"].is_string());
    assert!(body["omission_report"].is_string());
}

#[tokio::test]
async fn analyze_maps_errors_to_status_codes() {
    let h = harness(vec![], &[]);
    let response = h
        .app
        .clone()
        .oneshot(post("/api/analyze", json!({"topic": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "Topic is required");

    let response = h
        .app
        .clone()
        .oneshot(post("/api/analyze", json!({"topic": "Example Topic"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let h = harness(urls(2), &[]);
    let response = h
        .app
        .oneshot(post("/api/analyze", json!({"topic": "Example Topic"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn stream_emits_sse_frames_until_result() {
    let h = harness(urls(2), &["LEFT", "RIGHT"]);
    let response = h
        .app
        .oneshot(post("/api/analyze/stream", json!({"topic": "Tariffs"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let events: Vec<ProgressEvent> = text
        .split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| serde_json::from_str(frame.trim_start_matches("data: ")).unwrap())
        .collect();

    assert!(events.len() > 3);
    assert!(matches!(events.last(), Some(ProgressEvent::Result { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn stream_rejects_blank_topic_before_opening() {
    let h = harness(urls(1), &["LEFT"]);
    let response = h
        .app
        .oneshot(post("/api/analyze/stream", json!({"topic": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_lists_analyzed_topics() {
    let h = harness(urls(2), &["LEFT", "RIGHT"]);
    h.app
        .clone()
        .oneshot(post("/api/analyze", json!({"topic": "Tariffs"})))
        .await
        .unwrap();

    let body = json_body(h.app.oneshot(get("/api/history")).await.unwrap()).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["topic"], "Tariffs");
    assert!(items[0]["last_run"].is_string());
}

#[tokio::test]
async fn chat_uses_cached_rows() {
    let h = harness(urls(2), &["LEFT", "RIGHT"]);
    h.app
        .clone()
        .oneshot(post("/api/analyze", json!({"topic": "Tariffs"})))
        .await
        .unwrap();
    assert_eq!(h.store.row_count().await, 2);
    assert_eq!(h.store.entries_for_topic("tariffs", 20).await.unwrap().len(), 2);

    let response = h
        .app
        .oneshot(post("/api/chat", json!({"topic": "Tariffs", "query": "Who is right?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["answer"].is_string());
}

#[tokio::test]
async fn health_reports_components() {
    let h = harness(urls(1), &["LEFT"]);
    let body = json_body(h.app.oneshot(get("/api/health")).await.unwrap()).await;
    assert_eq!(body, json!({"status": "ok", "database": "ok", "scraper": "ok"}));
}
