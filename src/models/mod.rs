pub mod candidate;
pub mod news;
pub mod provider;
pub mod signal;

pub use candidate::{AlertKind, Candidate, ThemeInfo, ThemeLeader};
pub use news::{AnalysisResult, NewsItem, Recommendation};
pub use provider::{AttemptStatus, PollMode, ProviderAttempt};
pub use signal::{Priority, Signal, SourceMode};

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// The two exchanges the scanner covers. Every watchlist, chain and stats
/// bucket is partitioned by market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Us,
    Kr,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::Us, Market::Kr];

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "US" => Some(Market::Us),
            "KR" => Some(Market::Kr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Kr => "KR",
        }
    }

    /// Tickers are case-insensitive on US exchanges; KR codes are numeric.
    pub fn normalize_ticker(&self, ticker: &str) -> String {
        match self {
            Market::Us => ticker.trim().to_uppercase(),
            Market::Kr => ticker.trim().to_string(),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
