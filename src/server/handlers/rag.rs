use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Multipart, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::documents::extract_text;
use crate::rag::{AttachedDocument, RagAnswer, RagQuery};
use crate::server::extract::{AppJson, AppQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RagParams {
    pub q: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub question: String,
    pub session_id: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub answer: RagAnswer,
    pub session_id: String,
}

/// Rate limit first, then the optional key check for public RAG routes.
fn admit(state: &AppState, headers: &HeaderMap, peer: SocketAddr) -> Result<(), ApiError> {
    state.rate_limiter.check_request(headers, peer)?;
    if state.settings.server.require_key_for_rag {
        require_api_key(headers, &state.api_key)?;
    }
    Ok(())
}

pub async fn rag_query(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    AppQuery(params): AppQuery<RagParams>,
) -> Result<impl IntoResponse, ApiError> {
    admit(&state, &headers, peer)?;

    let question = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'q' is required".to_string()))?;

    let mut query = RagQuery::new(question);
    query.top_k = params.top_k;

    let answer = state.rag.answer(query).await?;
    Ok(Json(answer))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    AppJson(payload): AppJson<ChatPayload>,
) -> Result<impl IntoResponse, ApiError> {
    admit(&state, &headers, peer)?;

    let mut query = RagQuery::new(payload.question.clone());
    query.top_k = payload.top_k;

    let answer = state.rag.answer(query).await?;
    let session_id = resolve_session_id(payload.session_id);
    record_exchange(&state, &session_id, &payload.question, &answer, None).await;

    Ok(Json(ChatResponse { answer, session_id }))
}

pub async fn chat_upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    admit(&state, &headers, peer)?;

    let max_bytes = state.settings.uploads.max_bytes;
    let mut question: Option<String> = None;
    let mut session_id: Option<String> = None;
    let mut top_k: Option<usize> = None;
    let mut upload: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Could not read upload: {}", e)))?;
                if bytes.len() > max_bytes {
                    return Err(ApiError::BadRequest(format!(
                        "File exceeds the {} byte upload limit",
                        max_bytes
                    )));
                }
                upload = Some((filename, content_type, bytes.to_vec()));
            }
            "question" | "session_id" | "top_k" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid field '{}': {}", name, e)))?;
                match name.as_str() {
                    "question" => question = Some(value),
                    "session_id" => session_id = Some(value),
                    _ => {
                        let parsed = value.trim().parse::<usize>().map_err(|_| {
                            ApiError::BadRequest("top_k must be a positive integer".to_string())
                        })?;
                        top_k = Some(parsed);
                    }
                }
            }
            _ => {}
        }
    }

    let question =
        question.ok_or_else(|| ApiError::BadRequest("Field 'question' is required".to_string()))?;
    let (filename, content_type, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("Field 'file' is required".to_string()))?;

    let document_name = filename.clone();
    let text = tokio::task::spawn_blocking(move || {
        extract_text(&filename, content_type.as_deref(), &bytes)
    })
    .await
    .map_err(ApiError::internal)??;

    let mut query = RagQuery::new(question.clone());
    query.top_k = top_k;
    query.document = Some(AttachedDocument {
        name: document_name.clone(),
        text,
    });

    let answer = state.rag.answer(query).await?;
    let session_id = resolve_session_id(session_id);
    record_exchange(&state, &session_id, &question, &answer, Some(&document_name)).await;

    Ok(Json(ChatResponse { answer, session_id }))
}

fn resolve_session_id(requested: Option<String>) -> String {
    requested
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Stores both turns of an exchange in one transaction. Failures are logged
/// and do not fail the request.
async fn record_exchange(
    state: &AppState,
    session_id: &str,
    question: &str,
    answer: &RagAnswer,
    document: Option<&str>,
) {
    if !state.settings.history.enabled {
        return;
    }

    let question = question.trim();
    let human_metadata = match document {
        Some(name) => json!({"document": name}),
        None => json!({}),
    };
    let ai_metadata = json!({
        "citations": answer.citations,
        "sources": answer.sources,
    });

    let result = state
        .history
        .add_exchange(
            session_id,
            question,
            &human_metadata,
            &answer.answer,
            &ai_metadata,
        )
        .await;

    if let Err(err) = result {
        tracing::warn!("Failed to record chat history for {}: {}", session_id, err);
    }
}
