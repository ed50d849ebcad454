use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Market;

/// A headline candidate yielded by a news or filings feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub market: Market,
    pub published_at: DateTime<Utc>,
    /// Headline carries a breaking/exclusive marker and skips the keyword gate.
    #[serde(default)]
    pub is_priority: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reason: String,
}

/// Classifier verdict for one news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// 0..=10
    pub score: f64,
    #[serde(default)]
    pub certainty: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "topTicker")]
    pub top_ticker: Option<String>,
    /// Ticker named in the headline itself, which may differ from the
    /// classifier's pick.
    #[serde(default, alias = "tickerInNews")]
    pub ticker_in_news: Option<String>,
    #[serde(default, alias = "topTickerMarket")]
    pub top_ticker_market: Option<Market>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    /// Tickers worth promoting: the classifier's top pick (or the headline
    /// ticker when there is none), the headline ticker when it differs, then
    /// up to `max_recommendations` recommended names. Placeholders are dropped.
    pub fn promotion_targets(&self, fallback_market: Market, max_recommendations: usize) -> Vec<(String, Market)> {
        let market = self.top_ticker_market.unwrap_or(fallback_market);
        let mut targets: Vec<(String, Market)> = Vec::new();
        let mut push = |ticker: &str| {
            let ticker = market.normalize_ticker(ticker);
            if is_real_ticker(&ticker) && !targets.iter().any(|(t, _)| t == &ticker) {
                targets.push((ticker, market));
            }
        };

        for t in [self.top_ticker.as_deref(), self.ticker_in_news.as_deref()].into_iter().flatten() {
            push(t);
        }
        for rec in self.recommendations.iter().take(max_recommendations) {
            push(&rec.ticker);
        }

        targets
    }
}

fn is_real_ticker(t: &str) -> bool {
    let t = t.trim();
    !t.is_empty() && !t.eq_ignore_ascii_case("unknown") && !t.eq_ignore_ascii_case("null")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ticker: &str) -> Recommendation {
        Recommendation {
            ticker: ticker.into(),
            name: String::new(),
            reason: String::new(),
        }
    }

    #[test]
    fn test_promotion_targets_skip_placeholders() {
        let analysis = AnalysisResult {
            score: 9.0,
            certainty: "confirmed".into(),
            summary: String::new(),
            top_ticker: Some("ABCD".into()),
            ticker_in_news: None,
            top_ticker_market: None,
            recommendations: vec![rec("UNKNOWN"), rec("ABCD"), rec("WXYZ"), rec("EFGH"), rec("IJKL")],
        };

        let targets = analysis.promotion_targets(Market::Us, 3);
        assert_eq!(
            targets,
            vec![("ABCD".to_string(), Market::Us), ("WXYZ".to_string(), Market::Us)]
        );
    }

    #[test]
    fn test_analysis_accepts_camel_case_fields() {
        let json = r#"{"score": 8, "certainty": "confirmed", "topTicker": "ABCD", "topTickerMarket": "US", "recommendations": []}"#;
        let analysis: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.top_ticker.as_deref(), Some("ABCD"));
        assert_eq!(analysis.top_ticker_market, Some(Market::Us));
    }

    #[test]
    fn test_analysis_with_headline_and_top_ticker() {
        let json = r#"{"score": 9, "certainty": "confirmed", "ticker_in_news": "RIME", "top_ticker": "RIME", "top_ticker_market": "US", "recommendations": []}"#;
        let analysis: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.top_ticker.as_deref(), Some("RIME"));
        assert_eq!(analysis.ticker_in_news.as_deref(), Some("RIME"));
        assert_eq!(analysis.promotion_targets(Market::Kr, 3), vec![("RIME".to_string(), Market::Us)]);
    }

    #[test]
    fn test_headline_ticker_promoted_alongside_top_pick() {
        let json = r#"{"score": 8, "ticker_in_news": "abcd", "top_ticker": "WXYZ", "recommendations": [{"ticker": "EFGH"}]}"#;
        let analysis: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(
            analysis.promotion_targets(Market::Us, 3),
            vec![
                ("WXYZ".to_string(), Market::Us),
                ("ABCD".to_string(), Market::Us),
                ("EFGH".to_string(), Market::Us),
            ]
        );

        let only_headline = AnalysisResult {
            top_ticker: Some("UNKNOWN".into()),
            ticker_in_news: Some("IJKL".into()),
            ..analysis
        };
        assert_eq!(
            only_headline.promotion_targets(Market::Us, 0),
            vec![("IJKL".to_string(), Market::Us)]
        );
    }
}
