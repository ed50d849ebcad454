use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::FeedConfig;
use crate::models::{Market, NewsItem};
use crate::providers::ProviderContext;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Status(u16),

    #[error("malformed feed: {0}")]
    Parse(String),

    #[error("feed timed out")]
    Timeout,
}

/// A news or filings feed: yields zero or more headline candidates, or fails.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    fn market(&self) -> Market;

    async fn fetch(&self) -> Result<Vec<NewsItem>, FeedError>;
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// RSS 2.0 feed over HTTP.
#[derive(Debug, Clone)]
pub struct RssSource {
    ctx: ProviderContext,
    feed: FeedConfig,
}

impl RssSource {
    pub fn new(ctx: ProviderContext, feed: FeedConfig) -> Self {
        Self { ctx, feed }
    }
}

#[async_trait]
impl NewsSource for RssSource {
    fn name(&self) -> &str {
        &self.feed.name
    }

    fn market(&self) -> Market {
        self.feed.market
    }

    async fn fetch(&self) -> Result<Vec<NewsItem>, FeedError> {
        let resp = self
            .ctx
            .http
            .get(&self.feed.url)
            .headers(self.ctx.shaper.browser_headers())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status().as_u16()));
        }
        let body = resp.text().await?;

        let name = self.feed.name.clone();
        let market = self.feed.market;
        self.ctx
            .parse_pool
            .run(move || parse_rss(&body, &name, market))
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?
    }
}

/// Parse an RSS 2.0 document. Items without a title or link are skipped;
/// a missing or unparseable `pubDate` is treated as "now".
pub fn parse_rss(xml: &str, source: &str, market: Market) -> Result<Vec<NewsItem>, FeedError> {
    let doc: RssDocument = quick_xml::de::from_str(xml).map_err(|e| FeedError::Parse(e.to_string()))?;
    let now = Utc::now();

    Ok(doc
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let title = item.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let url = item.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
            let published_at = item
                .pub_date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);

            Some(NewsItem {
                title,
                url,
                source: source.to_string(),
                market,
                published_at,
                is_priority: false,
            })
        })
        .collect())
}
