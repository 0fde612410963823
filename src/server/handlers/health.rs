use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let total_messages = match state.history.get_total_message_count().await {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!("Failed to count stored messages: {}", err);
            0
        }
    };

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "index": state.rag.index_name(),
        "llm": state.rag.llm_name(),
        "chat_model": state.settings.llm.chat_model,
        "embed_model": state.settings.llm.embed_model,
        "top_k": state.settings.rag.top_k,
        "history_enabled": state.settings.history.enabled,
        "total_messages": total_messages,
    })))
}
