use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{parse_market, AppError};
use crate::tracking::WatchlistEntry;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub ticker: String,
    pub market: String,
}

/// GET /api/watchlist/:market: live entries, oldest promotion first.
pub async fn list(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Result<Json<Vec<WatchlistEntry>>, AppError> {
    let market = parse_market(&market)?;
    // Evicts expired entries before the snapshot.
    state.watchlist.active_tickers(market).await;
    Ok(Json(state.watchlist.entries(market).await))
}

/// POST /api/watchlist: manual promotion.
pub async fn promote(
    State(state): State<AppState>,
    Json(body): Json<PromoteRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let market = parse_market(&body.market)?;
    let ticker = market.normalize_ticker(&body.ticker);
    if ticker.is_empty() {
        return Err(AppError::BadRequest("ticker must not be empty".into()));
    }

    state.watchlist.promote(&ticker, market).await;
    tracing::info!(ticker = %ticker, market = %market, "Manual watchlist promotion via API");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ticker": ticker,
            "market": market,
            "size": state.watchlist.len(market).await,
        })),
    ))
}
