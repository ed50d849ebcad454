use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let started = state.stats.summary().await.session_start;

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "uptime_secs": (chrono::Utc::now() - started).num_seconds(),
        })),
    )
}
