use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::errors::{parse_market, AppError};
use crate::intelligence::{check_candidate, classify};
use crate::models::{Candidate, Priority};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub candidate: Candidate,
    pub on_watchlist: bool,
    pub passes_filters: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<&'static str>,
    /// Tier the candidate would get if it passed.
    pub tier: Priority,
}

/// GET /api/analyze/:market/:ticker: resolve one ticker and report how the
/// pipeline would treat it. Nothing is registered or emitted.
pub async fn analyze_ticker(
    State(state): State<AppState>,
    Path((market, ticker)): Path<(String, String)>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let market = parse_market(&market)?;
    let chains = state
        .scanner
        .chains(market)
        .ok_or_else(|| AppError::NotFound(format!("no providers configured for {market}")))?;

    let candidate = chains
        .quotes
        .resolve_ticker(&ticker)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no quote for {market}:{ticker}")))?;

    let on_watchlist = state.watchlist.contains(&candidate.ticker, market).await;
    let check = check_candidate(&candidate, state.scanner.pipeline().thresholds());
    let tier = classify(&candidate, on_watchlist);

    Ok(Json(AnalyzeResponse {
        passes_filters: check.is_ok(),
        rejection: check.err().map(|r| r.as_str()),
        on_watchlist,
        tier,
        candidate,
    }))
}
