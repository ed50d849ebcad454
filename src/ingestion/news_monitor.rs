use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use metrics::counter;

use super::rss::{FeedError, NewsSource};
use crate::classifier::{Classifier, ClassifierError};
use crate::config::FilterRules;
use crate::intelligence::{is_priority_headline, passes_keyword_filter};
use crate::models::{Market, NewsItem};
use crate::services::notifier::{format_news_alert, AlertSink};
use crate::tracking::{DedupLedger, DynamicWatchlist};

/// Headlines per tick that get a classifier call.
const MAX_CLASSIFIED: usize = 5;
/// Recommendation tickers promoted alongside the headline ticker.
const MAX_RECOMMENDATIONS: usize = 3;

/// Outcome of one news tick, mostly for logs and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsTickReport {
    pub fetched: usize,
    pub fresh: usize,
    pub shortlisted: usize,
    pub analyzed: usize,
    pub promoted: Vec<(String, Market)>,
}

/// News ingestion: feeds → dedup → keyword filter → classifier → watchlist.
pub struct NewsMonitor {
    sources: Vec<Arc<dyn NewsSource>>,
    classifier: Arc<dyn Classifier>,
    dedup: DedupLedger,
    watchlist: DynamicWatchlist,
    sink: Arc<dyn AlertSink>,
    rules: Arc<FilterRules>,
    quick_score_threshold: f64,
    promotion_threshold: f64,
    feed_timeout: Duration,
}

impl NewsMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Vec<Arc<dyn NewsSource>>,
        classifier: Arc<dyn Classifier>,
        dedup: DedupLedger,
        watchlist: DynamicWatchlist,
        sink: Arc<dyn AlertSink>,
        rules: Arc<FilterRules>,
        quick_score_threshold: f64,
        promotion_threshold: f64,
        feed_timeout: Duration,
    ) -> Self {
        Self {
            sources,
            classifier,
            dedup,
            watchlist,
            sink,
            rules,
            quick_score_threshold,
            promotion_threshold,
            feed_timeout,
        }
    }

    /// One pass over every feed:
    /// 1. Fetch all feeds concurrently, newest items first
    /// 2. Drop items already seen (URL or near-identical title)
    /// 3. Apply the keyword pre-filter
    /// 4. Quick-score the top few, fully analyze the promising ones
    /// 5. Promote tickers from results above the promotion threshold
    pub async fn tick(&self) -> NewsTickReport {
        let mut report = NewsTickReport::default();

        let mut items = self.fetch_all().await;
        report.fetched = items.len();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        let mut shortlist = Vec::new();
        for mut item in items {
            if !self.dedup.check_and_register_news(&item.url, &item.title).await {
                continue;
            }
            report.fresh += 1;
            counter!("news_items_total").increment(1);

            item.is_priority = is_priority_headline(&item.title, &self.rules);
            if passes_keyword_filter(&item, &self.rules) {
                shortlist.push(item);
            }
        }

        // Priority headlines jump the queue; order is otherwise newest first.
        shortlist.sort_by_key(|i| !i.is_priority);
        shortlist.truncate(MAX_CLASSIFIED);
        report.shortlisted = shortlist.len();

        for item in &shortlist {
            if !self.is_promising(item).await {
                continue;
            }
            report.analyzed += 1;

            let analysis = match self.classifier.analyze(item).await {
                Ok(Some(a)) => a,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, title = %item.title, "Classifier analyze failed, skipping item");
                    continue;
                }
            };

            if analysis.score < self.promotion_threshold {
                tracing::debug!(score = analysis.score, title = %item.title, "Below promotion threshold");
                continue;
            }

            let targets = analysis.promotion_targets(item.market, MAX_RECOMMENDATIONS);
            for (ticker, market) in &targets {
                self.watchlist.promote(ticker, *market).await;
                tracing::info!(ticker = %ticker, market = %market, score = analysis.score, "Promoted to watchlist");
            }
            report.promoted.extend(targets);

            self.sink.emit(&format_news_alert(item, &analysis)).await;
        }

        report
    }

    /// Quick pre-score. An unavailable classifier counts as "not promising".
    async fn is_promising(&self, item: &NewsItem) -> bool {
        match self.classifier.quick_score(&item.title, self.quick_score_threshold).await {
            Ok(promising) => promising,
            Err(ClassifierError::Timeout(after)) => {
                tracing::warn!(timeout = ?after, title = %item.title, "Classifier quick score timed out");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, title = %item.title, "Classifier quick score failed");
                false
            }
        }
    }

    async fn fetch_all(&self) -> Vec<NewsItem> {
        let fetches = self.sources.iter().map(|source| async move {
            let result = match tokio::time::timeout(self.feed_timeout, source.fetch()).await {
                Ok(r) => r,
                Err(_) => Err(FeedError::Timeout),
            };
            (source, result)
        });

        let mut items = Vec::new();
        for (source, result) in join_all(fetches).await {
            match result {
                Ok(batch) => {
                    tracing::debug!(source = %source.name(), count = batch.len(), "Feed fetched");
                    items.extend(batch);
                }
                Err(e) => {
                    tracing::warn!(source = %source.name(), market = %source.market(), error = %e, "Feed fetch failed");
                }
            }
        }
        items
    }
}
