use crate::models::{Candidate, Priority};

const CRITICAL_CHANGE_PCT: f64 = 20.0;
const CRITICAL_VOLUME_RATIO: f64 = 10.0;

/// Assign a severity tier to a detected move.
///
/// Rules, first match wins:
/// - **Low**: not a price alert (program flow, theme moves).
/// - **Critical**: watchlist ticker with change >= 20% and volume ratio >= 10x.
/// - **High**: any other watchlist move.
/// - **Medium**: full-market discovery.
///
/// An unknown volume ratio never reaches Critical.
pub fn classify(candidate: &Candidate, is_from_watchlist: bool) -> Priority {
    if !candidate.kind.is_price_alert() {
        return Priority::Low;
    }

    if is_from_watchlist {
        let volume_hot = candidate
            .volume_ratio
            .is_some_and(|r| r >= CRITICAL_VOLUME_RATIO);
        if candidate.change_percent >= CRITICAL_CHANGE_PCT && volume_hot {
            return Priority::Critical;
        }
        return Priority::High;
    }

    Priority::Medium
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
