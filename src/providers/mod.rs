pub mod chain;
pub mod finviz;
pub mod http;
pub mod naver;
pub mod yahoo;

pub use chain::SourceChain;
pub use finviz::FinvizGainers;
pub use http::{ParsePool, ProviderContext, RequestShaper};
pub use naver::{NaverProgramFlow, NaverSurge, NaverTheme};
pub use yahoo::{YahooChart, YahooScreener, YahooSweep};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Candidate, Market};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("unparseable response: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("parse worker failed: {0}")]
    WorkerPool(String),
}

/// Full-market source: yields the current top movers for a market.
#[async_trait]
pub trait GainersProvider: Send + Sync {
    fn id(&self) -> &'static str;

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError>;
}

/// Single-ticker source: yields the latest quote for one security, or `None`
/// when the provider has no data for it.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn id(&self) -> &'static str;

    async fn fetch_quote(&self, market: Market, ticker: &str) -> Result<Option<Candidate>, ProviderError>;
}

/// Parse a numeric cell such as `"+12.34%"`, `"1,234"` or `"-0.5"`.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '+' | ' ' | '\u{a0}'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a volume cell, accepting `K`/`M`/`B` suffixes.
pub(crate) fn parse_volume(text: &str) -> Option<u64> {
    let t = text.trim().replace(',', "");
    let (digits, scale) = match t.chars().last()?.to_ascii_uppercase() {
        'K' => (&t[..t.len() - 1], 1_000.0),
        'M' => (&t[..t.len() - 1], 1_000_000.0),
        'B' => (&t[..t.len() - 1], 1_000_000_000.0),
        _ => (t.as_str(), 1.0),
    };
    let value = digits.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then(|| (value * scale).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("+12.34%"), Some(12.34));
        assert_eq!(parse_number("-3.5%"), Some(-3.5));
        assert_eq!(parse_number("1,234"), Some(1234.0));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("1,234,567"), Some(1_234_567));
        assert_eq!(parse_volume("2.5M"), Some(2_500_000));
        assert_eq!(parse_volume("730K"), Some(730_000));
        assert_eq!(parse_volume("-"), None);
        assert_eq!(parse_volume(""), None);
    }
}
