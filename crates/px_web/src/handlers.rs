use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use px_core::{AnalysisResult, TopicHistory};
use px_pipeline::ChatRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{ApiError, AppState};

const HISTORY_LIMIT: usize = 15;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub sources_count: usize,
}

impl From<AnalysisResult> for AnalyzeResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            success: true,
            sources_count: result.bias_counts.total(),
            result,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub scraper: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub items: Vec<TopicHistory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

fn status_word(ok: bool) -> String {
    if ok { "ok" } else { "error" }.to_string()
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Narrative analysis API is running", "docs": "/api/health" }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.store().ping().await;
    if let Err(e) = &database {
        tracing::warn!("Health check: database unreachable: {}", e);
    }
    let scraper = state.pipeline.retrieval().health().await;
    if let Err(e) = &scraper {
        tracing::warn!("Health check: {}", e);
    }

    Json(HealthResponse {
        status: if database.is_ok() { "ok" } else { "degraded" }.to_string(),
        database: status_word(database.is_ok()),
        scraper: status_word(scraper.is_ok()),
    })
}

pub async fn history(State(state): State<Arc<AppState>>) -> Json<HistoryResponse> {
    let items = state
        .store()
        .recent_topics(HISTORY_LIMIT)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load history: {}", e);
            Vec::new()
        });
    Json(HistoryResponse { items })
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let result = state.pipeline.run(&request.topic).await?;
    Ok(Json(result.into()))
}

/// Streams progress as server-sent events. Requests that fail the preflight
/// are rejected with a status code before the stream opens.
pub async fn analyze_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, ApiError> {
    let topic = state.pipeline.preflight(&request.topic)?;

    let events = state.streamer.start(&topic).filter_map(|event| async move {
        match Event::default().json_data(&event) {
            Ok(frame) => Some(Ok::<_, Infallible>(frame)),
            Err(e) => {
                tracing::error!("Failed to encode progress event: {}", e);
                None
            }
        }
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    )
        .into_response())
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let answer = state.chat.answer(&request).await?;
    Ok(Json(ChatResponse { answer }))
}
