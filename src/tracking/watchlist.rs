use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::Market;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    pub market: Market,
    pub added_at: DateTime<Utc>,
}

/// Short-lived, per-market set of tickers promoted by the classifier.
///
/// Entries expire `ttl` after their most recent promotion. When a market
/// holds more than `capacity` entries, the oldest `added_at` is evicted.
#[derive(Clone)]
pub struct DynamicWatchlist {
    inner: Arc<Mutex<HashMap<Market, HashMap<String, DateTime<Utc>>>>>,
    ttl: Duration,
    capacity: usize,
}

impl DynamicWatchlist {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Add or refresh a ticker. Re-promoting resets its TTL.
    pub async fn promote(&self, ticker: &str, market: Market) {
        self.promote_at(ticker, market, Utc::now()).await
    }

    pub async fn promote_at(&self, ticker: &str, market: Market, now: DateTime<Utc>) {
        let ticker = market.normalize_ticker(ticker);
        if ticker.is_empty() {
            return;
        }

        let mut inner = self.inner.lock().await;
        let pool = inner.entry(market).or_default();
        let refreshed = pool.insert(ticker.clone(), now).is_some();

        let mut evicted = None;
        if pool.len() > self.capacity {
            if let Some(oldest) = pool
                .iter()
                .min_by_key(|(_, added_at)| **added_at)
                .map(|(t, _)| t.clone())
            {
                pool.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        let size = pool.len();
        drop(inner);

        counter!("watchlist_promotions_total").increment(1);
        gauge!("watchlist_size", "market" => market.as_str()).set(size as f64);

        tracing::info!(
            market = %market,
            ticker = %ticker,
            refreshed = refreshed,
            size = size,
            "Watchlist: ticker promoted"
        );
        if let Some(t) = evicted {
            tracing::info!(market = %market, ticker = %t, "Watchlist: capacity reached, evicted oldest");
        }
    }

    /// Live tickers for a market, oldest promotion first. Expired entries are
    /// removed as a side effect.
    pub async fn active_tickers(&self, market: Market) -> Vec<String> {
        self.active_tickers_at(market, Utc::now()).await
    }

    pub async fn active_tickers_at(&self, market: Market, now: DateTime<Utc>) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let Some(pool) = inner.get_mut(&market) else {
            return Vec::new();
        };

        let ttl = self.ttl;
        let before = pool.len();
        pool.retain(|ticker, added_at| {
            let live = now - *added_at < ttl;
            if !live {
                tracing::debug!(market = %market, ticker = %ticker, "Watchlist: TTL expired");
            }
            live
        });
        if pool.len() != before {
            gauge!("watchlist_size", "market" => market.as_str()).set(pool.len() as f64);
        }

        let mut entries: Vec<(&String, &DateTime<Utc>)> = pool.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(t, _)| t.clone()).collect()
    }

    /// Snapshot of current entries without evicting anything.
    pub async fn entries(&self, market: Market) -> Vec<WatchlistEntry> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<WatchlistEntry> = inner
            .get(&market)
            .map(|pool| {
                pool.iter()
                    .map(|(ticker, added_at)| WatchlistEntry {
                        ticker: ticker.clone(),
                        market,
                        added_at: *added_at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        entries
    }

    pub async fn contains(&self, ticker: &str, market: Market) -> bool {
        let ticker = market.normalize_ticker(ticker);
        self.inner
            .lock()
            .await
            .get(&market)
            .is_some_and(|pool| pool.contains_key(&ticker))
    }

    pub async fn len(&self, market: Market) -> usize {
        self.inner.lock().await.get(&market).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
    }

    fn watchlist() -> DynamicWatchlist {
        DynamicWatchlist::new(Duration::hours(24), 50)
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let wl = watchlist();
        wl.promote_at("ABCD", Market::Us, t0()).await;

        let just_before = t0() + Duration::hours(24) - Duration::seconds(1);
        assert_eq!(wl.active_tickers_at(Market::Us, just_before).await, vec!["ABCD"]);

        let at_expiry = t0() + Duration::hours(24);
        assert!(wl.active_tickers_at(Market::Us, at_expiry).await.is_empty());
        assert_eq!(wl.len(Market::Us).await, 0);
    }

    #[tokio::test]
    async fn test_repromotion_refreshes_ttl() {
        let wl = watchlist();
        wl.promote_at("ABCD", Market::Us, t0()).await;
        wl.promote_at("abcd", Market::Us, t0() + Duration::hours(20)).await;

        let later = t0() + Duration::hours(30);
        assert_eq!(wl.active_tickers_at(Market::Us, later).await, vec!["ABCD"]);
        assert_eq!(wl.len(Market::Us).await, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let wl = watchlist();
        for i in 0..50 {
            wl.promote_at(&format!("T{i:02}"), Market::Us, t0() + Duration::minutes(i)).await;
        }
        wl.promote_at("NEW", Market::Us, t0() + Duration::minutes(60)).await;

        assert_eq!(wl.len(Market::Us).await, 50);
        assert!(!wl.contains("T00", Market::Us).await);
        assert!(wl.contains("T01", Market::Us).await);
        assert!(wl.contains("NEW", Market::Us).await);
    }

    #[tokio::test]
    async fn test_markets_are_separate() {
        let wl = watchlist();
        wl.promote_at("005930", Market::Kr, t0()).await;
        wl.promote_at("ABCD", Market::Us, t0()).await;

        assert_eq!(wl.active_tickers_at(Market::Kr, t0()).await, vec!["005930"]);
        assert_eq!(wl.active_tickers_at(Market::Us, t0()).await, vec!["ABCD"]);
    }
}
