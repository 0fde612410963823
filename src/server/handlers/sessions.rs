use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::server::extract::AppQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let sessions = state.history.list_sessions().await?;
    Ok(Json(json!({"sessions": sessions})))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;

    let session = state
        .history
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    let messages = state
        .history
        .get_history(&session_id, state.settings.history.default_limit)
        .await?;

    Ok(Json(json!({"session": session, "messages": messages})))
}

pub async fn get_session_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    AppQuery(params): AppQuery<MessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let limit = params
        .limit
        .unwrap_or(state.settings.history.default_limit);

    let messages = state.history.get_history(&session_id, limit).await?;
    Ok(Json(json!({"messages": messages})))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;

    if !state.history.delete_session(&session_id).await? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(Json(json!({"status": "deleted", "session_id": session_id})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::security::ApiKey;
    use crate::history::MessageRole;
    use crate::server::handlers::test_support::test_state;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn session_routes_require_configured_key() {
        let (_dir, state) = test_state("unused").await;
        let mut state = Arc::try_unwrap(state).ok().unwrap();
        state.api_key = ApiKey::new(Some("s3cret".to_string()));
        let state = Arc::new(state);

        let denied = list_sessions(State(state.clone()), HeaderMap::new()).await;
        assert!(matches!(denied, Err(ApiError::Unauthorized)));

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("s3cret"));
        assert!(list_sessions(State(state), headers).await.is_ok());
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let (_dir, state) = test_state("unused").await;

        let detail = get_session(State(state.clone()), HeaderMap::new(), Path("nope".into())).await;
        assert!(matches!(detail, Err(ApiError::NotFound(_))));

        let deleted = delete_session(State(state), HeaderMap::new(), Path("nope".into())).await;
        assert!(matches!(deleted, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_stored_session() {
        let (_dir, state) = test_state("unused").await;
        state
            .history
            .add_message("s1", MessageRole::Human, "hi", &json!({}), Some("hi"))
            .await
            .unwrap();

        assert!(delete_session(State(state.clone()), HeaderMap::new(), Path("s1".into()))
            .await
            .is_ok());
        assert!(state.history.get_session("s1").await.unwrap().is_none());
    }
}
