use axum::extract::State;
use axum::Json;

use crate::tracking::StatsSnapshot;
use crate::AppState;

/// GET /api/stats
pub async fn summary(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.summary().await)
}
