use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::models::Market;
use crate::AppState;

/// POST /api/control/pause: Stop scanning and alert emission.
pub async fn pause(State(state): State<AppState>) -> impl IntoResponse {
    state.pause_flag.store(true, Ordering::Relaxed);
    tracing::warn!("Alert emission PAUSED via control API");
    (StatusCode::OK, Json(json!({ "status": "paused" })))
}

/// POST /api/control/resume: Resume scanning and alert emission.
pub async fn resume(State(state): State<AppState>) -> impl IntoResponse {
    state.pause_flag.store(false, Ordering::Relaxed);
    tracing::info!("Alert emission RESUMED via control API");
    (StatusCode::OK, Json(json!({ "status": "running" })))
}

/// GET /api/status: Current system status.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let paused = state.pause_flag.load(Ordering::Relaxed);

    let mut watchlist = serde_json::Map::new();
    for market in Market::ALL {
        watchlist.insert(market.to_string(), json!(state.watchlist.len(market).await));
    }

    let intervals: serde_json::Map<String, serde_json::Value> = Market::ALL
        .iter()
        .map(|m| (m.to_string(), json!(state.config.slow_interval_for(*m))))
        .collect();

    let stats = state.stats.summary().await;

    Json(json!({
        "paused": paused,
        "watchlist": watchlist,
        "stats": stats,
        "intervals": {
            "fast_secs": state.config.fast_interval_secs,
            "slow_secs": intervals,
            "news_secs": state.config.news_interval_secs,
        },
        "notifications": state.config.has_telegram(),
    }))
}
