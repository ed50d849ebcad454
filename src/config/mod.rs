use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::Market;

const DEFAULT_CLASSIFIER_URL: &str = "http://127.0.0.1:8000";

const DEFAULT_US_SWEEP: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "META", "BRK-B", "UNH", "JNJ",
    "V", "WMT", "JPM", "MA", "PG", "HD", "CVX", "MRK", "ABBV", "KO",
    "PEP", "AVGO", "COST", "TMO", "MCD", "CSCO", "ACN", "DHR", "VZ", "ABT",
];

const DEFAULT_KR_SWEEP: &[&str] = &[
    "005930", "000660", "035420", "035720", "051910", "005380", "006400", "068270",
    "207940", "105560",
];

const DEFAULT_NEWS_FEEDS: &[&str] = &[
    "US|PR Newswire|https://www.prnewswire.com/rss/news-releases-list.rss",
    "US|GlobeNewswire|https://www.globenewswire.com/RssFeed/subjectcode/15-allcategories/feedTitle/GlobeNewswire%20-%20All%20Categories",
    "KR|Maeil Business|https://www.mk.co.kr/rss/30000001/",
    "KR|Hankyung|https://www.hankyung.com/feed/economy",
];

/// One configured news feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub market: Market,
    pub name: String,
    pub url: String,
}

impl FeedConfig {
    /// Parse a `market|name|url` triple.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '|').map(str::trim);
        let market = Market::from_api_str(parts.next()?)?;
        let name = parts.next().filter(|s| !s.is_empty())?.to_string();
        let url = parts.next().filter(|s| !s.is_empty())?.to_string();
        Some(Self { market, name, url })
    }
}

/// Surge gates shared by both scan loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanThresholds {
    pub min_change_pct: f64,
    pub min_volume_ratio: f64,
    /// Program net-buy floor, in 1e6 KRW.
    pub min_program_buy: i64,
    pub min_theme_change_pct: f64,
    /// Members of the theme trading up.
    pub min_theme_advancers: u32,
}

impl Default for ScanThresholds {
    fn default() -> Self {
        Self {
            min_change_pct: 10.0,
            min_volume_ratio: 5.0,
            min_program_buy: 300,
            min_theme_change_pct: 3.0,
            min_theme_advancers: 5,
        }
    }
}

/// Keyword tables for the headline pre-filter. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRules {
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    /// Markers that flag a breaking headline (bypasses the positive check).
    pub priority_markers: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        let upper = |words: &[&str]| words.iter().map(|w| w.to_uppercase()).collect::<Vec<_>>();
        Self {
            positive_keywords: upper(&[
                "FDA approval", "approved", "clearance", "breakthrough therapy", "fast track",
                "orphan drug", "priority review", "phase 3", "topline", "positive results",
                "merger", "acquisition", "to acquire", "buyout", "definitive agreement",
                "partnership", "collaboration", "license agreement", "contract", "awarded",
                "record revenue", "raises guidance", "beats", "strategic alternatives",
                "승인", "계약", "인수", "합병", "공급", "수주", "임상", "특허",
            ]),
            negative_keywords: upper(&[
                "offering", "dilution", "reverse split", "delisting", "bankruptcy",
                "chapter 11", "lawsuit", "class action", "investigation", "going concern",
                "misses", "lowers guidance", "withdraws", "terminated", "halted",
                "유상증자", "상장폐지", "횡령", "소송", "감자",
            ]),
            priority_markers: vec![
                "특징주".into(),
                "단독".into(),
                "속보".into(),
                "긴급".into(),
                "BREAKING".into(),
                "EXCLUSIVE".into(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_token: Option<String>,
    pub log_json: bool,

    // Notification sink
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub notifications_enabled: bool,

    // Classifier service
    pub classifier_url: String,
    pub classifier_timeout_secs: u64,
    pub quick_score_threshold: f64,
    pub promotion_score_threshold: f64,

    // Scheduler cadence
    pub fast_interval_secs: u64,
    pub fast_jitter_secs: u64,
    pub slow_interval_secs: u64,
    pub slow_interval_kr_secs: Option<u64>,
    pub slow_jitter_secs: u64,
    pub news_interval_secs: u64,
    pub news_jitter_secs: u64,

    // Providers
    pub provider_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub request_jitter_ms: u64,
    pub parse_workers: usize,
    pub us_sweep_tickers: Vec<String>,
    pub kr_sweep_tickers: Vec<String>,
    pub news_feeds: Vec<FeedConfig>,

    // Gates and retention
    pub thresholds: ScanThresholds,
    pub watchlist_ttl_hours: i64,
    pub watchlist_capacity: usize,
    pub dedup_retention_days: i64,
    pub title_similarity: f64,
    pub title_window: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            api_token: None,
            log_json: false,
            telegram_bot_token: None,
            telegram_chat_id: None,
            notifications_enabled: false,
            classifier_url: DEFAULT_CLASSIFIER_URL.into(),
            classifier_timeout_secs: 20,
            quick_score_threshold: 8.0,
            promotion_score_threshold: 7.0,
            fast_interval_secs: 60,
            fast_jitter_secs: 5,
            slow_interval_secs: 600,
            slow_interval_kr_secs: None,
            slow_jitter_secs: 20,
            news_interval_secs: 30,
            news_jitter_secs: 5,
            provider_timeout_secs: 15,
            request_delay_ms: 500,
            request_jitter_ms: 200,
            parse_workers: 4,
            us_sweep_tickers: DEFAULT_US_SWEEP.iter().map(|s| s.to_string()).collect(),
            kr_sweep_tickers: DEFAULT_KR_SWEEP.iter().map(|s| s.to_string()).collect(),
            news_feeds: DEFAULT_NEWS_FEEDS.iter().filter_map(|s| FeedConfig::parse(s)).collect(),
            thresholds: ScanThresholds::default(),
            watchlist_ttl_hours: 24,
            watchlist_capacity: 50,
            dedup_retention_days: 7,
            title_similarity: 0.85,
            title_window: 50,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let d = Self::default();

        let news_feeds = match env::var("NEWS_FEEDS") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .filter_map(|entry| {
                    let parsed = FeedConfig::parse(entry);
                    if parsed.is_none() {
                        tracing::warn!(entry = %entry, "Ignoring malformed NEWS_FEEDS entry");
                    }
                    parsed
                })
                .collect(),
            _ => d.news_feeds,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or(d.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| d.port.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("PORT must be a valid port number: {e}"))?,
            api_token: non_empty("API_TOKEN"),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),

            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty("TELEGRAM_CHAT_ID"),
            notifications_enabled: parse_or("NOTIFICATIONS_ENABLED", d.notifications_enabled),

            classifier_url: env::var("CLASSIFIER_URL").unwrap_or(d.classifier_url),
            classifier_timeout_secs: parse_or("CLASSIFIER_TIMEOUT_SECS", d.classifier_timeout_secs),
            quick_score_threshold: parse_or("QUICK_SCORE_THRESHOLD", d.quick_score_threshold),
            promotion_score_threshold: parse_or("PROMOTION_SCORE_THRESHOLD", d.promotion_score_threshold),

            fast_interval_secs: parse_or("FAST_INTERVAL_SECS", d.fast_interval_secs),
            fast_jitter_secs: parse_or("FAST_JITTER_SECS", d.fast_jitter_secs),
            slow_interval_secs: parse_or("SLOW_INTERVAL_SECS", d.slow_interval_secs),
            slow_interval_kr_secs: env::var("SLOW_INTERVAL_KR_SECS").ok().and_then(|v| v.parse().ok()),
            slow_jitter_secs: parse_or("SLOW_JITTER_SECS", d.slow_jitter_secs),
            news_interval_secs: parse_or("NEWS_INTERVAL_SECS", d.news_interval_secs),
            news_jitter_secs: parse_or("NEWS_JITTER_SECS", d.news_jitter_secs),

            provider_timeout_secs: parse_or("PROVIDER_TIMEOUT_SECS", d.provider_timeout_secs),
            request_delay_ms: parse_or("REQUEST_DELAY_MS", d.request_delay_ms),
            request_jitter_ms: parse_or("REQUEST_JITTER_MS", d.request_jitter_ms),
            parse_workers: parse_or("PARSE_WORKERS", d.parse_workers).max(1),
            us_sweep_tickers: list_or("US_SWEEP_TICKERS", d.us_sweep_tickers),
            kr_sweep_tickers: list_or("KR_SWEEP_TICKERS", d.kr_sweep_tickers),
            news_feeds,

            thresholds: ScanThresholds {
                min_change_pct: parse_or("MIN_CHANGE_PCT", d.thresholds.min_change_pct),
                min_volume_ratio: parse_or("MIN_VOLUME_RATIO", d.thresholds.min_volume_ratio),
                min_program_buy: parse_or("MIN_PROGRAM_BUY", d.thresholds.min_program_buy),
                min_theme_change_pct: parse_or("MIN_THEME_CHANGE_PCT", d.thresholds.min_theme_change_pct),
                min_theme_advancers: parse_or("MIN_THEME_ADVANCERS", d.thresholds.min_theme_advancers),
            },
            watchlist_ttl_hours: parse_or("WATCHLIST_TTL_HOURS", d.watchlist_ttl_hours),
            watchlist_capacity: parse_or("WATCHLIST_CAPACITY", d.watchlist_capacity).max(1),
            dedup_retention_days: parse_or("DEDUP_RETENTION_DAYS", d.dedup_retention_days),
            title_similarity: parse_or("TITLE_SIMILARITY", d.title_similarity),
            title_window: parse_or("TITLE_WINDOW", d.title_window),
        })
    }

    /// Returns true if the Telegram sink is fully configured and switched on.
    pub fn has_telegram(&self) -> bool {
        self.notifications_enabled
            && self.telegram_bot_token.is_some()
            && self.telegram_chat_id.is_some()
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Full-market cadence for one market. KR may run on a shorter cadence.
    pub fn slow_interval_for(&self, market: Market) -> u64 {
        match (market, self.slow_interval_kr_secs) {
            (Market::Kr, Some(secs)) => secs,
            _ => self.slow_interval_secs,
        }
    }

    pub fn sweep_tickers(&self, market: Market) -> &[String] {
        match market {
            Market::Us => &self.us_sweep_tickers,
            Market::Kr => &self.kr_sweep_tickers,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn list_or(key: &str, default: Vec<String>) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => {
            let items: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if items.is_empty() {
                default
            } else {
                items
            }
        }
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_config_parse() {
        let feed = FeedConfig::parse("US|PR Newswire|https://example.com/rss").unwrap();
        assert_eq!(feed.market, Market::Us);
        assert_eq!(feed.name, "PR Newswire");
        assert_eq!(feed.url, "https://example.com/rss");

        assert!(FeedConfig::parse("XX|name|url").is_none());
        assert!(FeedConfig::parse("US|name").is_none());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.watchlist_capacity, 50);
        assert_eq!(config.watchlist_ttl_hours, 24);
        assert_eq!(config.dedup_retention_days, 7);
        assert_eq!(config.fast_interval_secs, 60);
        assert_eq!(config.slow_interval_secs, 600);
        assert_eq!(config.news_feeds.len(), 4);
    }

    #[test]
    fn test_slow_interval_override_for_kr() {
        let config = AppConfig {
            slow_interval_kr_secs: Some(300),
            ..AppConfig::default()
        };
        assert_eq!(config.slow_interval_for(Market::Kr), 300);
        assert_eq!(config.slow_interval_for(Market::Us), 600);
    }
}
