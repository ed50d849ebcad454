use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{GainersProvider, ProviderError, QuoteProvider, RequestShaper};
use crate::models::{AttemptStatus, Candidate, Market, PollMode, ProviderAttempt};
use crate::tracking::StatsAggregator;

/// Ordered list of interchangeable providers for one market.
///
/// Providers are tried strictly in order, one at a time, until one yields a
/// non-empty result. Empty, failing and timed-out attempts advance to the
/// next provider. Every attempt is reported to the stats aggregator. When
/// the list is exhausted the chain returns nothing; it never surfaces a
/// provider error to the caller.
pub struct SourceChain {
    name: String,
    market: Market,
    gainers: Vec<Arc<dyn GainersProvider>>,
    quotes: Vec<Arc<dyn QuoteProvider>>,
    timeout: Duration,
    shaper: Arc<RequestShaper>,
    stats: StatsAggregator,
}

impl SourceChain {
    pub fn new(
        name: impl Into<String>,
        market: Market,
        timeout: Duration,
        shaper: Arc<RequestShaper>,
        stats: StatsAggregator,
    ) -> Self {
        Self {
            name: name.into(),
            market,
            gainers: Vec::new(),
            quotes: Vec::new(),
            timeout,
            shaper,
            stats,
        }
    }

    pub fn with_gainers(mut self, provider: Arc<dyn GainersProvider>) -> Self {
        self.gainers.push(provider);
        self
    }

    pub fn with_quotes(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.quotes.push(provider);
        self
    }

    /// Market-wide mode: the first non-empty gainers list.
    pub async fn resolve_market_wide(&self) -> Vec<Candidate> {
        let mut tried = Vec::with_capacity(self.gainers.len());
        let mut any_answered = false;

        for provider in &self.gainers {
            let id = provider.id();
            tried.push(id);
            let (status, rows) = self.attempt(id, provider.fetch_gainers(self.market)).await;
            if status == AttemptStatus::Success {
                return rows;
            }
            any_answered |= status == AttemptStatus::Empty;
        }

        self.exhausted(PollMode::MarketWide, &tried, any_answered, None).await;
        Vec::new()
    }

    /// Single-ticker mode: the first provider that knows the ticker.
    pub async fn resolve_ticker(&self, ticker: &str) -> Option<Candidate> {
        let ticker = self.market.normalize_ticker(ticker);
        let ticker = ticker.as_str();
        let mut tried = Vec::with_capacity(self.quotes.len());
        let mut any_answered = false;

        for provider in &self.quotes {
            let id = provider.id();
            tried.push(id);
            let fut = async {
                provider
                    .fetch_quote(self.market, ticker)
                    .await
                    .map(|quote| quote.into_iter().collect::<Vec<_>>())
            };
            let (status, rows) = self.attempt(id, fut).await;
            if status == AttemptStatus::Success {
                return rows.into_iter().next();
            }
            any_answered |= status == AttemptStatus::Empty;
        }

        self.exhausted(PollMode::SingleTicker, &tried, any_answered, Some(ticker)).await;
        None
    }

    /// Resolve each ticker in turn. Tickers no provider knows are dropped.
    pub async fn resolve_tickers(&self, tickers: &[String]) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            if let Some(c) = self.resolve_ticker(ticker).await {
                out.push(c);
            }
        }
        out
    }

    async fn attempt<F>(&self, provider_id: &'static str, fut: F) -> (AttemptStatus, Vec<Candidate>)
    where
        F: Future<Output = Result<Vec<Candidate>, ProviderError>>,
    {
        self.shaper.pause().await;

        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (status, rows) = match result {
            Ok(rows) if rows.is_empty() => {
                tracing::info!(chain = %self.name, provider = provider_id, elapsed_ms, "Provider returned no rows, trying next");
                (AttemptStatus::Empty, rows)
            }
            Ok(rows) => {
                tracing::debug!(chain = %self.name, provider = provider_id, rows = rows.len(), elapsed_ms, "Provider succeeded");
                (AttemptStatus::Success, rows)
            }
            Err(ProviderError::Timeout(after)) => {
                tracing::warn!(chain = %self.name, provider = provider_id, timeout = ?after, "Provider timed out, trying next");
                (AttemptStatus::Timeout, Vec::new())
            }
            Err(e) => {
                tracing::warn!(chain = %self.name, provider = provider_id, error = %e, "Provider failed, trying next");
                (AttemptStatus::Error, Vec::new())
            }
        };

        self.stats
            .record_provider_attempt(&ProviderAttempt {
                provider_id: provider_id.to_string(),
                status,
                row_count: rows.len(),
                elapsed_ms,
            })
            .await;

        (status, rows)
    }

    async fn exhausted(&self, mode: PollMode, tried: &[&'static str], any_answered: bool, ticker: Option<&str>) {
        self.stats.record_chain_exhausted(self.market, mode).await;

        if any_answered {
            // At least one provider is reachable; there was just nothing to report.
            tracing::info!(chain = %self.name, mode = %mode, ticker = ?ticker, providers = ?tried, "Chain exhausted without rows");
        } else {
            tracing::error!(
                chain = %self.name,
                market = %self.market,
                mode = %mode,
                ticker = ?ticker,
                providers = ?tried,
                "All providers failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        id: &'static str,
        rows: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GainersProvider for Fixed {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn fetch_gainers(&self, market: Market) -> Result<Vec<Candidate>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.rows)
                .map(|i| Candidate::surge(format!("T{i}"), "t", market, self.id))
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl GainersProvider for Failing {
        fn id(&self) -> &'static str {
            "failing"
        }

        async fn fetch_gainers(&self, _market: Market) -> Result<Vec<Candidate>, ProviderError> {
            Err(ProviderError::Status { provider: "failing", status: 503 })
        }
    }

    fn fixed(id: &'static str, rows: usize) -> Arc<Fixed> {
        Arc::new(Fixed { id, rows, calls: AtomicUsize::new(0) })
    }

    fn chain(stats: &StatsAggregator) -> SourceChain {
        SourceChain::new(
            "test",
            Market::Us,
            Duration::from_secs(1),
            Arc::new(RequestShaper::disabled()),
            stats.clone(),
        )
    }

    #[tokio::test]
    async fn test_error_advances_to_next_provider() {
        let stats = StatsAggregator::new();
        let b = fixed("b", 2);
        let c = chain(&stats)
            .with_gainers(Arc::new(Failing))
            .with_gainers(b.clone());

        let rows = c.resolve_market_wide().await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.provider_id == "b"));

        let s = stats.summary().await;
        assert_eq!(s.providers["failing"].error, 1);
        assert_eq!(s.providers["b"].success, 1);
        assert!(s.chain_exhausted.is_empty());
    }

    #[tokio::test]
    async fn test_no_providers_is_exhausted() {
        let stats = StatsAggregator::new();
        let c = chain(&stats);
        assert!(c.resolve_market_wide().await.is_empty());
        assert!(c.resolve_ticker("ABCD").await.is_none());

        let s = stats.summary().await;
        assert_eq!(s.chain_exhausted.get("US:market_wide"), Some(&1));
        assert_eq!(s.chain_exhausted.get("US:single_ticker"), Some(&1));
    }
}
