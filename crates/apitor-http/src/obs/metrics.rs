//! Exposition endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;

/// Prometheus text format content type.
pub const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Render every registered metric in Prometheus text exposition format.
pub async fn render_metrics(State(app): State<AppState>) -> Response {
    match app.monitor().gather_text() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "metrics exposition failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
