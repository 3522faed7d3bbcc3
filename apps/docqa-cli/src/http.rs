//! HTTP surface over a [`QueryOrchestrator`].
//!
//! `GET /` banner, `GET /status`, `POST /query {question}` and `POST /process`
//! (forced rebuild). Failures are reported as a status field plus a message;
//! backend outages map to HTTP 502.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use docqa_core::config::ServerSettings;
use docqa_rag::{AnswerOutcome, QueryOrchestrator, Source};

pub const BANNER: &str = "docqa API is running - ask questions about your documents";

#[derive(Clone)]
pub struct AppState {
    pub rag: Arc<QueryOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    NotReady,
    Error,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub status: QueryStatus,
    pub sources: Vec<Source>,
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/query", post(query))
        .route("/process", post(process))
        .with_state(state)
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any)
}

/// Bind, start loading the corpus in the background, and serve until shutdown.
pub async fn serve(rag: Arc<QueryOrchestrator>, settings: &ServerSettings) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| "invalid server.host/server.port")?;

    let warm = Arc::clone(&rag);
    tokio::spawn(async move {
        match warm.ensure_loaded().await {
            Ok(corpus) => info!(chunks = corpus.len(), "corpus loaded"),
            Err(e) => error!(error = %e, "initial corpus load failed; will retry on first request"),
        }
    });

    let app = router(AppState { rag }, &settings.allowed_origins);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": BANNER }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    match state.rag.status().await {
        Ok(report) => (StatusCode::OK, Json(json!(report))),
        Err(e) => {
            error!(error = %e, "status failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": e.to_string() })))
        }
    }
}

async fn query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let response = QueryResponse {
                answer: format!("Error: {}", rejection.body_text()),
                status: QueryStatus::Error,
                sources: Vec::new(),
            };
            return (StatusCode::BAD_REQUEST, Json(response));
        }
    };
    let (code, response) = match state.rag.ask(&req.question).await {
        Ok(answer) => {
            let (code, status) = match answer.outcome {
                AnswerOutcome::Generated => (StatusCode::OK, QueryStatus::Success),
                AnswerOutcome::NotReady => (StatusCode::OK, QueryStatus::NotReady),
                AnswerOutcome::EmptyQuestion => (StatusCode::BAD_REQUEST, QueryStatus::Error),
                AnswerOutcome::BackendUnavailable => (StatusCode::BAD_GATEWAY, QueryStatus::Error),
            };
            (code, QueryResponse { answer: answer.text, status, sources: answer.sources })
        }
        Err(e) => {
            error!(error = %e, "query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                QueryResponse { answer: format!("Error: {e}"), status: QueryStatus::Error, sources: Vec::new() },
            )
        }
    };
    (code, Json(response))
}

async fn process(State(state): State<AppState>) -> impl IntoResponse {
    info!("manual rebuild requested");
    match state.rag.reload(true).await {
        Ok(corpus) => {
            let count = corpus.len();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "chunks_processed": count,
                    "message": format!("Successfully processed {count} text chunks"),
                })),
            )
        }
        Err(e) => {
            error!(error = %e, "rebuild failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "status": "error", "detail": e.to_string() })))
        }
    }
}
