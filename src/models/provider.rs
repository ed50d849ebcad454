use serde::{Deserialize, Serialize};
use std::fmt;

/// How a source chain is being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    SingleTicker,
    MarketWide,
}

impl PollMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollMode::SingleTicker => "single_ticker",
            PollMode::MarketWide => "market_wide",
        }
    }
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Empty,
    Error,
    Timeout,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Empty => "empty",
            AttemptStatus::Error => "error",
            AttemptStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one provider call inside a chain invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub status: AttemptStatus,
    pub row_count: usize,
    pub elapsed_ms: u64,
}
