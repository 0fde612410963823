use axum::response::{Html, IntoResponse};

const WIDGET_HTML: &str = include_str!("../../../assets/widget.html");

/// Self-contained chat widget that talks to `/api/chat`.
pub async fn widget() -> impl IntoResponse {
    Html(WIDGET_HTML)
}
