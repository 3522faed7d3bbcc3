use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use docqa_core::config::GenerationSettings;
use docqa_generate::{DecodingOptions, GenerationError, Generator, OllamaClient};

type Seen = Arc<Mutex<Option<Value>>>;

async fn spawn(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{}", addr), handle)
}

fn client(base: &str, timeout: Duration) -> OllamaClient {
    OllamaClient::new(base, "llama3.2:3b", DecodingOptions::default(), timeout).expect("client")
}

#[tokio::test]
async fn posts_prompt_and_returns_response_text() {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route(
            "/api/generate",
            post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                *seen.lock().unwrap() = Some(body);
                Json(json!({ "model": "llama3.2:3b", "response": "Prime the pump first.", "done": true }))
            }),
        )
        .with_state(seen.clone());
    let (base, handle) = spawn(app).await;

    // trailing slash is tolerated
    let answer = client(&format!("{base}/"), Duration::from_secs(5)).generate("how do I start the pump?").await.expect("generate");
    assert_eq!(answer, "Prime the pump first.");

    let body = seen.lock().unwrap().clone().expect("request captured");
    assert_eq!(body["model"], "llama3.2:3b");
    assert_eq!(body["prompt"], "how do I start the pump?");
    assert_eq!(body["stream"], false);
    assert_eq!(body["options"]["top_k"], 40);
    assert!((body["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert!((body["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    handle.abort();
}

#[tokio::test]
async fn http_error_status_is_reported_with_body() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async { (StatusCode::NOT_FOUND, "model 'llama3.2:3b' not found") }),
    );
    let (base, handle) = spawn(app).await;
    let err = client(&base, Duration::from_secs(5)).generate("hi").await.expect_err("404");
    match err {
        GenerationError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    handle.abort();
}

#[tokio::test]
async fn body_without_response_field_is_malformed() {
    let app = Router::new().route("/api/generate", post(|| async { Json(json!({ "error": "oops" })) }));
    let (base, handle) = spawn(app).await;
    let err = client(&base, Duration::from_secs(5)).generate("hi").await.expect_err("malformed");
    assert!(matches!(err, GenerationError::Malformed { .. }), "got {err:?}");
    handle.abort();
}

#[tokio::test]
async fn slow_backend_times_out() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "response": "late" }))
        }),
    );
    let (base, handle) = spawn(app).await;
    let err = client(&base, Duration::from_millis(200)).generate("hi").await.expect_err("timeout");
    assert!(matches!(err, GenerationError::Timeout { .. }), "got {err:?}");
    handle.abort();
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let base = format!("http://127.0.0.1:{port}");
    let err = client(&base, Duration::from_secs(5)).generate("hi").await.expect_err("refused");
    assert!(matches!(err, GenerationError::Unreachable { .. }), "got {err:?}");
    assert_eq!(err.endpoint(), Some(format!("{base}/api/generate").as_str()));
}

#[test]
fn from_settings_uses_configured_backend() {
    let settings = GenerationSettings { base_url: "http://ollama:11434/".to_string(), ..Default::default() };
    let client = OllamaClient::from_settings(&settings).expect("client");
    assert_eq!(client.base_url(), "http://ollama:11434");
    assert_eq!(client.model(), "llama3.2:3b");
}
