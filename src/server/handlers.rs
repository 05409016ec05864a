//! Route handlers.
//!
//! JSON bodies are read leniently: a missing or unparsable body is treated
//! like an empty object, so validation errors come back as `{"error": ...}`.

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::error::ApiError;
use super::AppState;
use crate::assistant::{ChatReply, JournalReply, VoiceReply};
use crate::journal::WeeklySummary;
use crate::tts::{sniff_content_type, Emotion};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteTaskRequest {
    /// Kept loose so negative or fractional values become a 400, not a parse error.
    #[serde(default)]
    pub index: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JournalEntryRequest {
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

fn body_or_default<T: Default>(body: Option<Json<T>>) -> T {
    body.map(|Json(b)| b).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

pub async fn chat(
    State(state): State<AppState>,
    body: Option<Json<ChatRequest>>,
) -> Result<Json<ChatReply>, ApiError> {
    let req = body_or_default(body);
    let message = non_empty(req.message)
        .ok_or_else(|| ApiError::BadRequest("No message provided".into()))?;
    let emotion = req.emotion.as_deref().map(Emotion::parse).unwrap_or_default();

    Ok(Json(state.chat(&message, emotion).await))
}

pub async fn voice(
    State(state): State<AppState>,
    multipart: Option<Multipart>,
) -> Result<Json<VoiceReply>, ApiError> {
    let mut multipart = multipart.ok_or_else(|| ApiError::BadRequest("No audio file".into()))?;

    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart upload: {}", e);
                return Err(ApiError::BadRequest("No audio file".into()));
            }
        };
        if field.name() != Some("audio") {
            continue;
        }
        let file_name = field.file_name().map(|n| n.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read audio: {}", e)))?;
        upload = Some((bytes, file_name));
        break;
    }

    let (bytes, file_name) = upload.ok_or_else(|| ApiError::BadRequest("No audio file".into()))?;
    info!(bytes = bytes.len(), "Voice upload received");

    let reply = state
        .voice(&bytes, file_name.as_deref())
        .await
        .map_err(|e| {
            warn!("Voice request failed: {}", e);
            ApiError::Internal(e.to_string())
        })?;
    Ok(Json(reply))
}

/// Serve the most recently rendered reply audio.
pub async fn audio(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = state.audio_path();
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("No audio available".into()));
        }
        Err(e) => return Err(ApiError::Internal(format!("Failed to read audio: {}", e))),
    };
    let content_type = sniff_content_type(&bytes);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

pub async fn memory(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "conversations": state.conversations() }))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub async fn tasks(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tasks": state.tasks() }))
}

pub async fn complete_task(
    State(state): State<AppState>,
    body: Option<Json<CompleteTaskRequest>>,
) -> Result<Json<Value>, ApiError> {
    let invalid = || ApiError::BadRequest("Invalid task index".into());
    let index = body_or_default(body)
        .index
        .and_then(|v| v.as_u64())
        .ok_or_else(invalid)?;

    if state.complete_task(index as usize) {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(invalid())
    }
}

pub async fn clear_tasks(State(state): State<AppState>) -> Json<Value> {
    state.clear_tasks();
    Json(json!({ "success": true }))
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

pub async fn journal(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "entries": state.journal() }))
}

pub async fn journal_entry(
    State(state): State<AppState>,
    body: Option<Json<JournalEntryRequest>>,
) -> Result<Json<JournalReply>, ApiError> {
    let req = body_or_default(body);
    let entry = non_empty(req.entry)
        .ok_or_else(|| ApiError::BadRequest("Entry text required".into()))?;

    Ok(Json(state.add_journal_entry(&entry, req.mood.as_deref()).await))
}

pub async fn journal_prompts(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "prompts": state.journal_prompts() }))
}

pub async fn journal_summary(State(state): State<AppState>) -> Json<WeeklySummary> {
    Json(state.weekly_summary().await)
}

pub async fn journal_search(
    State(state): State<AppState>,
    body: Option<Json<SearchRequest>>,
) -> Json<Value> {
    let query = body_or_default(body).query.unwrap_or_default();
    Json(json!({ "results": state.search_journal(&query) }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "provider": state.provider().as_str() }))
}
