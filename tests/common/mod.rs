use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use surge_watch::classifier::{Classifier, ClassifierError};
use surge_watch::ingestion::{FeedError, NewsSource};
use surge_watch::models::{AnalysisResult, Candidate, Market, NewsItem, ThemeInfo, ThemeLeader};
use surge_watch::providers::{GainersProvider, ProviderError, QuoteProvider, RequestShaper, SourceChain};
use surge_watch::services::AlertSink;
use surge_watch::tracking::StatsAggregator;

/// What a scripted provider does when called.
#[allow(dead_code)]
#[derive(Clone)]
pub enum Script {
    Rows(usize),
    Fail,
    Hang,
}

/// Gainers provider that follows a script and counts its calls.
pub struct ScriptedGainers {
    pub id: &'static str,
    pub script: Script,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedGainers {
    pub fn new(id: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            id,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GainersProvider for ScriptedGainers {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Rows(n) => Ok((0..n)
                .map(|i| surge_candidate(&format!("{}{i}", self.id.to_uppercase()), market, 15.0, Some(6.0), self.id))
                .collect()),
            Script::Fail => Err(ProviderError::Status { provider: self.id, status: 503 }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Quote provider backed by a mutable ticker → (change, ratio) table.
#[derive(Default)]
pub struct FakeQuotes {
    pub quotes: Mutex<HashMap<String, (f64, Option<f64>)>>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeQuotes {
    pub fn set(&self, ticker: &str, change: f64, ratio: Option<f64>) {
        self.quotes.lock().unwrap().insert(ticker.to_string(), (change, ratio));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for FakeQuotes {
    fn id(&self) -> &'static str {
        "fake_quotes"
    }

    async fn fetch_quote(&self, market: Market, ticker: &str) -> Result<Option<Candidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let quote = self.quotes.lock().unwrap().get(ticker).copied();
        Ok(quote.map(|(change, ratio)| surge_candidate(ticker, market, change, ratio, "fake_quotes")))
    }
}

/// Sink that keeps every emitted message.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn emit(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

/// Classifier returning fixed verdicts keyed by headline.
#[derive(Default)]
pub struct FakeClassifier {
    pub verdicts: Mutex<HashMap<String, AnalysisResult>>,
    pub unavailable: bool,
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn quick_score(&self, title: &str, threshold: f64) -> Result<bool, ClassifierError> {
        if self.unavailable {
            return Err(ClassifierError::Timeout(Duration::from_secs(1)));
        }
        Ok(self
            .verdicts
            .lock()
            .unwrap()
            .get(title)
            .is_some_and(|v| v.score >= threshold))
    }

    async fn analyze(&self, item: &NewsItem) -> Result<Option<AnalysisResult>, ClassifierError> {
        if self.unavailable {
            return Err(ClassifierError::Timeout(Duration::from_secs(1)));
        }
        Ok(self.verdicts.lock().unwrap().get(&item.title).cloned())
    }
}

/// Feed returning a fixed batch of items.
pub struct StaticFeed {
    pub items: Vec<NewsItem>,
}

#[async_trait]
impl NewsSource for StaticFeed {
    fn name(&self) -> &str {
        "static"
    }

    fn market(&self) -> Market {
        Market::Us
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>, FeedError> {
        Ok(self.items.clone())
    }
}

/// Theme ranking returning fixed `(name, change, advancers)` rows, each led
/// by one stock.
#[allow(dead_code)]
pub struct ThemeFeed {
    pub themes: Vec<(&'static str, f64, u32)>,
}

#[async_trait]
impl GainersProvider for ThemeFeed {
    fn id(&self) -> &'static str {
        "theme_feed"
    }

    async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
        Ok(self
            .themes
            .iter()
            .enumerate()
            .map(|(i, (name, change, advancers))| {
                let info = ThemeInfo {
                    name: name.to_string(),
                    advancers: *advancers,
                    leaders: vec![ThemeLeader {
                        code: format!("00{i}000"),
                        name: format!("{name} leader"),
                        price: Decimal::from(15_000),
                        change_percent: change * 3.0,
                    }],
                };
                Candidate::theme(info, market, *change, self.id())
            })
            .collect())
    }
}

pub fn surge_candidate(ticker: &str, market: Market, change: f64, ratio: Option<f64>, provider: &str) -> Candidate {
    Candidate::surge(ticker, ticker, market, provider)
        .with_move(Decimal::from(10), change)
        .with_volume(1_000_000, ratio)
}

#[allow(dead_code)]
pub fn news_item(title: &str, url: &str) -> NewsItem {
    NewsItem {
        title: title.into(),
        url: url.into(),
        source: "static".into(),
        market: Market::Us,
        published_at: Utc::now(),
        is_priority: false,
    }
}

/// Chain with no request shaping and a short per-provider timeout.
#[allow(dead_code)]
pub fn test_chain(name: &str, market: Market, stats: &StatsAggregator) -> SourceChain {
    SourceChain::new(
        name,
        market,
        Duration::from_millis(200),
        Arc::new(RequestShaper::disabled()),
        stats.clone(),
    )
}
