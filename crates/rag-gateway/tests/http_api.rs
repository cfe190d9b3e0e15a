//! HTTP API tests driving the router with in-memory providers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tower::ServiceExt;

use rag_gateway::providers::mock::{MockCalls, MockObjectStore, MockRagService, MockReply};
use rag_gateway::server::{build_router, state::AppState};
use rag_gateway::{ConversationTurn, GatewayConfig, ImportSummary};

const BOUNDARY: &str = "gateway-test-boundary";

struct Harness {
    router: Router,
    calls: Arc<MockCalls>,
    store: Arc<MockObjectStore>,
}

fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.gcp.project_id = "test".to_string();
    config.gcp.corpus_display_name = "handbook".to_string();
    config.gcp.upload_prefix = "uploads/".to_string();
    config.server.index_path =
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static/index.html"));
    config.init.max_attempts = 1;
    config
}

fn harness_with(config: GatewayConfig, rag: MockRagService, store: MockObjectStore) -> Harness {
    let calls = rag.calls();
    let store = Arc::new(store);
    let state = AppState::from_parts(config, Arc::new(rag), store.clone());
    Harness {
        router: build_router(state),
        calls,
        store,
    }
}

fn harness(rag: MockRagService) -> Harness {
    harness_with(config(), rag, MockObjectStore::new("test-bucket"))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    let value = assert_ok!(serde_json::from_slice::<Value>(&body));
    (status, value)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::post("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn history() -> Value {
    json!({
        "contents": [
            {"role": "user", "parts": [{"text": "hi"}]},
            {"role": "model", "parts": [{"text": "hello"}]},
            {"role": "user", "parts": [{"text": "what is the leave policy?"}]}
        ]
    })
}

#[tokio::test]
async fn test_index_serves_landing_page() {
    let h = harness(MockRagService::with_corpus("handbook"));
    let (status, body) = send(&h.router, Request::get("/").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("<html"));
}

#[tokio::test]
async fn test_missing_landing_page_is_structured_404() {
    let mut config = config();
    config.server.index_path = PathBuf::from("/nonexistent/index.html");
    let h = harness_with(
        config,
        MockRagService::with_corpus("handbook"),
        MockObjectStore::new("test-bucket"),
    );

    let (status, body) = send_json(&h.router, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn test_test_marker() {
    let h = harness(MockRagService::with_corpus("handbook"));
    let (status, body) = send(&h.router, Request::get("/test").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    assert_eq!(h.calls.setups(), 0, "probes must not initialize the model");
}

#[tokio::test]
async fn test_chat_forwards_history_in_order() {
    let h = harness(
        MockRagService::with_corpus("handbook")
            .reply(MockReply::Text("Twenty days per year.".to_string())),
    );

    let (status, body) = send_json(&h.router, chat_request(history())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Twenty days per year.");
    assert_eq!(
        h.calls.generations(),
        vec![vec![
            ConversationTurn::user("hi"),
            ConversationTurn::model("hello"),
            ConversationTurn::user("what is the leave policy?"),
        ]]
    );
}

#[tokio::test]
async fn test_malformed_chat_is_rejected_before_remote_calls() {
    let h = harness(MockRagService::with_corpus("handbook"));

    let payloads = [
        json!({"contents": [{"parts": [{"text": "hi"}]}]}),
        json!({"contents": [{"role": "user"}]}),
        json!({"contents": "hi"}),
        json!({"contents": []}),
        json!({"messages": []}),
    ];

    for payload in payloads {
        let (status, body) = send_json(&h.router, chat_request(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "malformed_request");
    }

    let (status, _) = send(
        &h.router,
        Request::post("/chat").body(Body::from("{not json")).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.calls.setups(), 0);
    assert!(h.calls.generations().is_empty());
}

#[tokio::test]
async fn test_empty_generation_is_not_success() {
    let h = harness(
        MockRagService::with_corpus("handbook").reply(MockReply::Empty("SAFETY".to_string())),
    );

    let (status, body) = send_json(&h.router, chat_request(history())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["type"], "empty_generation");
    assert!(body["error"]["message"].as_str().unwrap().contains("SAFETY"));
}

#[tokio::test]
async fn test_generation_failure_is_500() {
    let h = harness(
        MockRagService::with_corpus("handbook")
            .reply(MockReply::Fail("quota exceeded".to_string())),
    );

    let (status, body) = send_json(&h.router, chat_request(history())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "generation_failure");
}

#[tokio::test]
async fn test_hung_generation_times_out() {
    let mut config = config();
    config.timeouts.generation_secs = 1;
    let h = harness_with(
        config,
        MockRagService::with_corpus("handbook").reply(MockReply::Hang),
        MockObjectStore::new("test-bucket"),
    );

    let (status, body) = send_json(&h.router, chat_request(history())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "generation_failure");
    assert!(body["error"]["message"].as_str().unwrap().contains("did not answer"));
}

#[tokio::test]
async fn test_upload_stores_and_ingests() {
    let h = harness(MockRagService::with_corpus("handbook").import_summary(ImportSummary {
        imported: 1,
        skipped: 0,
        failed: 0,
    }));

    let (status, body) = send_json(
        &h.router,
        multipart_request("file", "handbook.pdf", b"%PDF-1.4 test"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("handbook.pdf"));
    assert_eq!(body["uri"], "gs://test-bucket/uploads/handbook.pdf");
    assert_eq!(body["imported_count"], 1);
    assert_eq!(body["skipped_count"], 0);

    let objects = h.store.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].0, "uploads/handbook.pdf");
    assert_eq!(&objects[0].1[..], b"%PDF-1.4 test");
    assert_eq!(objects[0].2, "application/pdf");
    assert_eq!(h.store.ensure_calls(), 1);

    assert_eq!(
        h.calls.imports(),
        vec![(
            "projects/test/locations/us-central1/ragCorpora/handbook".to_string(),
            vec!["gs://test-bucket/uploads/handbook.pdf".to_string()],
        )]
    );
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let h = harness(MockRagService::with_corpus("handbook"));

    let (status, body) = send_json(
        &h.router,
        multipart_request("attachment", "handbook.pdf", b"data"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "missing_file");
    assert!(h.store.objects().is_empty());
    assert_eq!(h.store.ensure_calls(), 0);
    assert!(h.calls.imports().is_empty());
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let h = harness(MockRagService::with_corpus("handbook"));

    let (status, body) = send_json(&h.router, multipart_request("file", "", b"data")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "missing_file");
    assert!(h.store.objects().is_empty());
}

#[tokio::test]
async fn test_upload_that_is_not_multipart() {
    let h = harness(MockRagService::with_corpus("handbook"));

    let (status, body) = send_json(
        &h.router,
        Request::post("/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "missing_file");
}

#[tokio::test]
async fn test_storage_failure_is_500() {
    let h = harness_with(
        config(),
        MockRagService::with_corpus("handbook"),
        MockObjectStore::failing("test-bucket"),
    );

    let (status, body) = send_json(
        &h.router,
        multipart_request("file", "handbook.pdf", b"data"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "storage_failure");
    assert!(h.calls.imports().is_empty());
}

#[tokio::test]
async fn test_initialization_failure_reports_unavailable() {
    let h = harness(MockRagService::without_corpora());

    for _ in 0..3 {
        let (status, body) = send_json(&h.router, chat_request(history())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["type"], "service_unavailable");
        assert!(body["error"]["message"].as_str().unwrap().contains("handbook"));

        let (status, body) = send_json(
            &h.router,
            multipart_request("file", "handbook.pdf", b"data"),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["type"], "service_unavailable");
    }

    // Process keeps serving
    let (status, _) = send(&h.router, Request::get("/test").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(h.calls.setups(), 1);
    assert!(h.calls.generations().is_empty());
    assert!(h.store.objects().is_empty());
}

#[tokio::test]
async fn test_readiness_follows_initialization() {
    let h = harness(MockRagService::with_corpus("handbook"));
    let ready = || Request::get("/ready").body(Body::empty()).unwrap();

    let (status, body) = send_json(&h.router, ready()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "uninitialized");

    let (status, _) = send_json(&h.router, chat_request(history())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(&h.router, ready()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["model"], "gemini-2.5-flash");
}

#[tokio::test]
async fn test_oversized_upload_is_413() {
    let mut config = config();
    config.server.max_upload_size = 64;
    let h = harness_with(
        config,
        MockRagService::with_corpus("handbook"),
        MockObjectStore::new("test-bucket"),
    );

    let (status, body) = send_json(
        &h.router,
        multipart_request("file", "handbook.pdf", &[b'x'; 4096]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["type"], "payload_too_large");
    assert_eq!(h.calls.setups(), 0);
    assert!(h.store.objects().is_empty());
}

#[tokio::test]
async fn test_hung_storage_times_out() {
    let mut config = config();
    config.timeouts.storage_secs = 1;
    let h = harness_with(
        config,
        MockRagService::with_corpus("handbook"),
        MockObjectStore::hanging("test-bucket"),
    );

    let (status, body) = send_json(
        &h.router,
        multipart_request("file", "handbook.pdf", b"data"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "storage_failure");
    assert!(body["error"]["message"].as_str().unwrap().contains("timed out"));
    assert!(h.calls.imports().is_empty());
}

#[tokio::test]
async fn test_ingestion_failure_is_500() {
    let h = harness(MockRagService::with_corpus("handbook").failing_import("quota exhausted"));

    let (status, body) = send_json(
        &h.router,
        multipart_request("file", "handbook.pdf", b"data"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "storage_failure");
    assert!(body["error"]["message"].as_str().unwrap().contains("quota exhausted"));
    // The object was written before ingestion was attempted
    assert_eq!(h.store.objects().len(), 1);
    assert_eq!(h.calls.imports().len(), 1);
}

#[tokio::test]
async fn test_abandoned_chat_does_not_leave_setup_in_progress() {
    let h = harness(MockRagService::with_corpus("handbook").setup_delay(Duration::from_secs(5)));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        send(&h.router, chat_request(history())),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(h.calls.setups(), 1);

    let (status, body) = send_json(&h.router, Request::get("/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "uninitialized");
}
