use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{config, health, rag, sessions, widget};
use crate::state::AppState;

/// Multipart framing on top of the raw file size.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Creates the application router with CORS, request tracing and every
/// route.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    let body_limit = state.settings.uploads.max_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::get_status))
        .route("/api/config", get(config::get_config))
        .route("/rag", get(rag::rag_query))
        .route("/api/chat", post(rag::chat))
        .route(
            "/api/chat/upload",
            post(rag::chat_upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/sessions", get(sessions::list_sessions))
        .route(
            "/api/sessions/:session_id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/:session_id/messages",
            get(sessions::get_session_messages),
        )
        .route("/widget", get(widget::widget))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(resolve_allow_origin(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

/// `*` anywhere in the list opens the API to every origin; otherwise only
/// the parseable listed origins are allowed.
fn resolve_allow_origin(origins: &[String]) -> AllowOrigin {
    let trimmed: Vec<&str> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .collect();

    if trimmed.is_empty() || trimmed.contains(&"*") {
        return AllowOrigin::any();
    }

    let list = trimmed
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    AllowOrigin::list(list)
}
