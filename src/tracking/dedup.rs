use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::models::{AlertKind, Market};

/// Identity used to suppress repeat alerts for the same underlying event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// One alert per (market, kind, ticker) per calendar day.
    Alert {
        market: Market,
        kind: AlertKind,
        ticker: String,
        date: NaiveDate,
    },
    /// A news item already seen at this URL.
    Url(String),
}

impl DedupKey {
    pub fn surge(market: Market, ticker: &str, date: NaiveDate) -> Self {
        DedupKey::Alert {
            market,
            kind: AlertKind::Surge,
            ticker: market.normalize_ticker(ticker),
            date,
        }
    }

    pub fn alert(market: Market, kind: AlertKind, ticker: &str, date: NaiveDate) -> Self {
        DedupKey::Alert {
            market,
            kind,
            ticker: market.normalize_ticker(ticker),
            date,
        }
    }
}

/// Append-only per-day sets of emitted keys plus a sliding window of recent
/// news titles for fuzzy matching.
///
/// The check and the insert of [`check_and_register`](Self::check_and_register)
/// happen under one guard with no await in between, so two loops racing on the
/// same key cannot both win.
#[derive(Clone)]
pub struct DedupLedger {
    inner: Arc<Mutex<LedgerInner>>,
    retention_days: i64,
    similarity_threshold: f64,
    title_window: usize,
}

struct LedgerInner {
    days: BTreeMap<NaiveDate, HashSet<DedupKey>>,
    recent_titles: VecDeque<String>,
}

impl LedgerInner {
    fn contains(&self, key: &DedupKey) -> bool {
        self.days.values().any(|set| set.contains(key))
    }

    fn insert(&mut self, key: DedupKey, today: NaiveDate) {
        self.days.entry(today).or_default().insert(key);
    }

    fn title_matches(&self, title: &str, threshold: f64) -> bool {
        let title = title.to_lowercase();
        self.recent_titles
            .iter()
            .any(|seen| strsim::normalized_levenshtein(&title, seen) > threshold)
    }

    fn push_title(&mut self, title: &str, window: usize) {
        self.recent_titles.push_back(title.to_lowercase());
        while self.recent_titles.len() > window {
            self.recent_titles.pop_front();
        }
    }
}

impl DedupLedger {
    pub fn new(retention_days: i64, similarity_threshold: f64, title_window: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerInner {
                days: BTreeMap::new(),
                recent_titles: VecDeque::new(),
            })),
            retention_days,
            similarity_threshold,
            title_window,
        }
    }

    pub async fn is_duplicate(&self, key: &DedupKey) -> bool {
        self.inner.lock().await.contains(key)
    }

    /// Record a key under today's set. Callers that have not checked
    /// [`is_duplicate`](Self::is_duplicate) under the same logical step should
    /// use [`check_and_register`](Self::check_and_register) instead.
    pub async fn register(&self, key: DedupKey) {
        self.register_at(key, Utc::now()).await
    }

    pub async fn register_at(&self, key: DedupKey, now: DateTime<Utc>) {
        self.inner.lock().await.insert(key, now.date_naive());
    }

    /// Returns `true` if the key was new and is now registered.
    pub async fn check_and_register(&self, key: DedupKey) -> bool {
        self.check_and_register_at(key, Utc::now()).await
    }

    pub async fn check_and_register_at(&self, key: DedupKey, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.contains(&key) {
            return false;
        }
        inner.insert(key, now.date_naive());
        true
    }

    /// Returns `true` if the item is new: the URL was never seen and the title
    /// is not too close to any recent title. A new item is registered.
    pub async fn check_and_register_news(&self, url: &str, title: &str) -> bool {
        self.check_and_register_news_at(url, title, Utc::now()).await
    }

    pub async fn check_and_register_news_at(&self, url: &str, title: &str, now: DateTime<Utc>) -> bool {
        let key = DedupKey::Url(url.to_string());
        let mut inner = self.inner.lock().await;
        if inner.contains(&key) || inner.title_matches(title, self.similarity_threshold) {
            return false;
        }
        inner.insert(key, now.date_naive());
        inner.push_title(title, self.title_window);
        true
    }

    /// Drop day sets older than the retention window. Returns the number of
    /// keys removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.date_naive() - Duration::days(self.retention_days);
        let mut inner = self.inner.lock().await;
        let kept = inner.days.split_off(&cutoff);
        let removed: usize = inner.days.values().map(HashSet::len).sum();
        inner.days = kept;

        if removed > 0 {
            tracing::debug!(
                removed = removed,
                cutoff = %cutoff,
                "Dedup ledger: purged expired keys"
            );
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.days.values().map(HashSet::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
