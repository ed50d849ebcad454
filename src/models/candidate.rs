use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Market;

/// What kind of observation produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Price/volume surge on a single security.
    Surge,
    /// Aggregate program-trading net buy. Not a price alert.
    ProgramFlow,
    /// A whole theme/sector moving together. Not a price alert.
    Theme,
}

impl AlertKind {
    pub fn is_price_alert(&self) -> bool {
        matches!(self, AlertKind::Surge)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Surge => "surge",
            AlertKind::ProgramFlow => "program_flow",
            AlertKind::Theme => "theme",
        }
    }
}

/// One of the top gainers inside a theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeLeader {
    pub code: String,
    pub name: String,
    pub price: Decimal,
    pub change_percent: f64,
}

/// Theme-level move: the theme's average change, how many members are up,
/// and its best performers (highest change first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeInfo {
    pub name: String,
    pub advancers: u32,
    pub leaders: Vec<ThemeLeader>,
}

/// A prospective move discovered from a provider or a watchlist poll.
///
/// `volume_ratio` is `None` when the provider cannot supply it; that is
/// "unknown", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub ticker: String,
    pub display_name: String,
    pub market: Market,
    pub kind: AlertKind,
    pub price: Decimal,
    pub change_percent: f64,
    pub volume: u64,
    pub volume_ratio: Option<f64>,
    pub provider_id: String,
    /// Program net-buy amount (in 1e6 KRW) for `ProgramFlow` candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_buy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeInfo>,
}

impl Candidate {
    pub fn surge(
        ticker: impl Into<String>,
        display_name: impl Into<String>,
        market: Market,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            display_name: display_name.into(),
            market,
            kind: AlertKind::Surge,
            price: Decimal::ZERO,
            change_percent: 0.0,
            volume: 0,
            volume_ratio: None,
            provider_id: provider_id.into(),
            net_buy: None,
            theme: None,
        }
    }

    /// Theme candidate. Ticker and price are the top leader's; the change is
    /// the theme's own.
    pub fn theme(info: ThemeInfo, market: Market, change_percent: f64, provider_id: impl Into<String>) -> Self {
        let (ticker, name, price) = match info.leaders.first() {
            Some(l) => (l.code.clone(), l.name.clone(), l.price),
            None => (info.name.clone(), info.name.clone(), Decimal::ZERO),
        };
        let mut c = Self::surge(ticker, name, market, provider_id).with_move(price, change_percent);
        c.kind = AlertKind::Theme;
        c.theme = Some(info);
        c
    }

    /// What the per-day alert key is built from: the theme name for theme
    /// moves, the ticker otherwise.
    pub fn dedup_subject(&self) -> &str {
        match (&self.kind, &self.theme) {
            (AlertKind::Theme, Some(t)) => &t.name,
            _ => &self.ticker,
        }
    }

    pub fn with_move(mut self, price: Decimal, change_percent: f64) -> Self {
        self.price = price;
        self.change_percent = change_percent;
        self
    }

    pub fn with_volume(mut self, volume: u64, volume_ratio: Option<f64>) -> Self {
        self.volume = volume;
        self.volume_ratio = volume_ratio.filter(|r| r.is_finite());
        self
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Candidate: {}:{} change={:.2}% vol_ratio={} provider={}",
            self.market,
            self.ticker,
            self.change_percent,
            self.volume_ratio
                .map(|r| format!("{r:.1}x"))
                .unwrap_or_else(|| "n/a".into()),
            self.provider_id,
        )
    }
}
