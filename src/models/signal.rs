use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Candidate;

/// Severity tier assigned to a signal, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Badge prefixed to alert text.
    pub fn badge(&self) -> &'static str {
        match self {
            Priority::Critical => "🚨🚨🚨",
            Priority::High => "🔥🔥",
            Priority::Medium => "🔥",
            Priority::Low => "📊",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which scan loop discovered the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    Watchlist,
    FullMarket,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Watchlist => "watchlist",
            SourceMode::FullMarket => "full_market",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate that passed every gate and is ready to alert on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub candidate: Candidate,
    pub reason: String,
    pub tier: Priority,
    pub timestamp: DateTime<Utc>,
    pub source_mode: SourceMode,
}
