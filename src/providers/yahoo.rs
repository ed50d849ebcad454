use async_trait::async_trait;
use futures_util::future::join_all;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::{GainersProvider, ProviderContext, ProviderError, QuoteProvider};
use crate::models::{Candidate, Market};

const SCREENER_URL: &str = "https://query1.finance.yahoo.com/v1/finance/screener";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SCREENER_ROWS: usize = 20;
const SWEEP_BATCH: usize = 5;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScreenerResponse {
    finance: ScreenerFinance,
}

#[derive(Debug, Deserialize)]
struct ScreenerFinance {
    #[serde(default)]
    result: Vec<ScreenerResult>,
}

#[derive(Debug, Deserialize)]
struct ScreenerResult {
    #[serde(default)]
    quotes: Vec<ScreenerQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScreenerQuote {
    symbol: Option<String>,
    short_name: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_change_percent: Option<f64>,
    regular_market_volume: Option<u64>,
    average_daily_volume3_month: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    short_name: Option<String>,
    long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Yahoo symbol for a market-local ticker. KR codes starting with `0` are
/// KOSPI listings, the rest KOSDAQ.
pub fn yahoo_symbol(market: Market, ticker: &str) -> String {
    match market {
        Market::Us => ticker.to_uppercase().replace('.', "-"),
        Market::Kr if ticker.starts_with('0') => format!("{ticker}.KS"),
        Market::Kr => format!("{ticker}.KQ"),
    }
}

// ---------------------------------------------------------------------------
// Screener
// ---------------------------------------------------------------------------

/// US gainers from the Yahoo equity screener, pre-filtered server side to
/// `percentchange > 10`.
#[derive(Debug, Clone)]
pub struct YahooScreener {
    ctx: ProviderContext,
}

impl YahooScreener {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl GainersProvider for YahooScreener {
    fn id(&self) -> &'static str {
        "yahoo_screener"
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        if market != Market::Us {
            return Ok(Vec::new());
        }

        let payload = json!({
            "size": 50,
            "offset": 0,
            "sortField": "percentchange",
            "sortType": "desc",
            "quoteType": "equity",
            "query": {
                "operator": "and",
                "operands": [
                    { "operator": "gt", "operands": ["percentchange", 10] },
                    { "operator": "gt", "operands": ["intradaymarketcap", 1_000_000] }
                ]
            }
        });

        let resp: ScreenerResponse = self.ctx.post_json(self.id(), SCREENER_URL, &payload).await?;
        Ok(screener_candidates(resp))
    }
}

fn screener_candidates(resp: ScreenerResponse) -> Vec<Candidate> {
    let quotes = resp
        .finance
        .result
        .into_iter()
        .next()
        .map(|r| r.quotes)
        .unwrap_or_default();

    quotes
        .into_iter()
        .take(SCREENER_ROWS)
        .filter_map(|q| {
            let Some(symbol) = q.symbol.filter(|s| !s.is_empty()) else {
                tracing::debug!("Yahoo screener: quote without symbol, skipping");
                return None;
            };
            let change = q.regular_market_change_percent?;
            let price = q.regular_market_price.and_then(Decimal::from_f64).unwrap_or(Decimal::ZERO);
            let volume = q.regular_market_volume.unwrap_or(0);
            let ratio = match q.average_daily_volume3_month {
                Some(avg) if avg > 0 => Some(volume as f64 / avg as f64),
                _ => None,
            };
            let name = q.short_name.unwrap_or_else(|| symbol.clone());
            Some(
                Candidate::surge(symbol, name, Market::Us, "yahoo_screener")
                    .with_move(price.round_dp(4), change)
                    .with_volume(volume, ratio),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Chart (single ticker)
// ---------------------------------------------------------------------------

/// Daily bars for one symbol. Change is measured between the last two
/// closes; volume ratio against the mean of the earlier sessions.
#[derive(Debug, Clone)]
pub struct YahooChart {
    ctx: ProviderContext,
}

impl YahooChart {
    pub fn new(ctx: ProviderContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl QuoteProvider for YahooChart {
    fn id(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_quote(&self, market: Market, ticker: &str) -> Result<Option<Candidate>, ProviderError> {
        let symbol = yahoo_symbol(market, ticker);
        let url = chart_url(&symbol);
        let resp: ChartResponse = self.ctx.get_json(self.id(), &url).await?;
        Ok(quote_from_chart(market, ticker, self.id(), resp))
    }
}

/// Five daily bars, extended hours included so pre-market and after-hours
/// moves show up in the last close.
pub(crate) fn chart_url(symbol: &str) -> String {
    format!("{CHART_URL}/{symbol}?range=5d&interval=1d&includePrePost=true")
}

pub(crate) fn quote_from_chart(
    market: Market,
    ticker: &str,
    provider_id: &str,
    resp: ChartResponse,
) -> Option<Candidate> {
    let result = resp.chart.result?.into_iter().next()?;
    let bars = result.indicators.quote.into_iter().next()?;

    let closes: Vec<f64> = bars.close.into_iter().flatten().collect();
    if closes.len() < 2 {
        return None;
    }
    let current = closes[closes.len() - 1];
    let prev = closes[closes.len() - 2];
    if prev <= 0.0 {
        return None;
    }
    let change = (current - prev) / prev * 100.0;

    let volumes: Vec<u64> = bars.volume.into_iter().flatten().collect();
    let (volume, ratio) = match volumes.split_last() {
        Some((last, earlier)) if !earlier.is_empty() => {
            let avg = earlier.iter().sum::<u64>() as f64 / earlier.len() as f64;
            (*last, (avg > 0.0).then(|| *last as f64 / avg))
        }
        Some((last, _)) => (*last, None),
        None => (0, None),
    };

    let price = result
        .meta
        .regular_market_price
        .unwrap_or(current);
    let name = result
        .meta
        .long_name
        .or(result.meta.short_name)
        .unwrap_or_else(|| ticker.to_string());

    Some(
        Candidate::surge(market.normalize_ticker(ticker), name, market, provider_id)
            .with_move(Decimal::from_f64(price).unwrap_or(Decimal::ZERO).round_dp(4), change)
            .with_volume(volume, ratio),
    )
}

// ---------------------------------------------------------------------------
// Per-symbol sweep (market-wide fallback)
// ---------------------------------------------------------------------------

/// Last-resort market-wide source: polls a fixed universe symbol by symbol,
/// a few at a time, and reports everything that is up on the day.
pub struct YahooSweep {
    chart: YahooChart,
    universe: Vec<String>,
}

impl YahooSweep {
    pub fn new(ctx: ProviderContext, universe: Vec<String>) -> Self {
        Self {
            chart: YahooChart::new(ctx),
            universe,
        }
    }
}

#[async_trait]
impl GainersProvider for YahooSweep {
    fn id(&self) -> &'static str {
        "yahoo_sweep"
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        let mut out = Vec::new();
        let mut last_err = None;
        let mut answered = 0usize;

        for batch in self.universe.chunks(SWEEP_BATCH) {
            self.chart.ctx.shaper.pause().await;
            let results = join_all(batch.iter().map(|t| self.chart.fetch_quote(market, t))).await;

            for (ticker, result) in batch.iter().zip(results) {
                match result {
                    Ok(Some(mut c)) => {
                        answered += 1;
                        if c.change_percent > 0.0 {
                            c.provider_id = self.id().to_string();
                            out.push(c);
                        }
                    }
                    Ok(None) => answered += 1,
                    Err(e) => {
                        tracing::debug!(error = %e, ticker = %ticker, "Yahoo sweep: symbol failed");
                        last_err = Some(e);
                    }
                }
            }
        }

        if answered == 0 {
            if let Some(e) = last_err {
                return Err(e);
            }
        }

        out.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yahoo_symbol() {
        assert_eq!(yahoo_symbol(Market::Us, "brk.b"), "BRK-B");
        assert_eq!(yahoo_symbol(Market::Kr, "005930"), "005930.KS");
        assert_eq!(yahoo_symbol(Market::Kr, "293490"), "293490.KQ");
    }

    #[test]
    fn test_chart_url_includes_extended_hours() {
        let url = chart_url("ABCD");
        assert!(url.starts_with("https://query1.finance.yahoo.com/v8/finance/chart/ABCD?"));
        assert!(url.contains("includePrePost=true"));
        assert!(url.contains("range=5d"));
    }

    #[test]
    fn test_quote_from_chart() {
        let json = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":12.2,"longName":"Abcd Therapeutics"},
            "indicators":{"quote":[{"close":[9.5,10.0,null,10.0,12.2],"volume":[100000,120000,80000,null,1100000]}]}}],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();

        let c = quote_from_chart(Market::Us, "abcd", "yahoo_chart", resp).unwrap();
        assert_eq!(c.ticker, "ABCD");
        assert_eq!(c.display_name, "Abcd Therapeutics");
        assert!((c.change_percent - 22.0).abs() < 1e-9);
        assert_eq!(c.volume, 1_100_000);
        assert!((c.volume_ratio.unwrap() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_chart_with_single_bar_yields_none() {
        let json = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{"close":[10.0],"volume":[5]}]}}]}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        assert!(quote_from_chart(Market::Us, "X", "yahoo_chart", resp).is_none());
    }

    #[test]
    fn test_screener_rows() {
        let json = r#"{"finance":{"result":[{"quotes":[
            {"symbol":"ABCD","shortName":"Abcd","regularMarketPrice":3.5,"regularMarketChangePercent":41.0,
             "regularMarketVolume":6000000,"averageDailyVolume3Month":500000},
            {"shortName":"No symbol","regularMarketChangePercent":30.0},
            {"symbol":"EFGH","regularMarketPrice":8.0,"regularMarketChangePercent":15.0,"regularMarketVolume":1000}
        ]}]}}"#;
        let resp: ScreenerResponse = serde_json::from_str(json).unwrap();
        let rows = screener_candidates(resp);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "ABCD");
        assert!((rows[0].volume_ratio.unwrap() - 12.0).abs() < 1e-9);
        assert_eq!(rows[1].ticker, "EFGH");
        assert_eq!(rows[1].display_name, "EFGH");
        assert_eq!(rows[1].volume_ratio, None);
    }
}
