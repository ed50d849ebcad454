use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde_json::json;
use thiserror::Error;

use chrono::{DateTime, Utc};

use crate::models::{AlertKind, AnalysisResult, NewsItem, Signal};
use crate::tracking::StatsSnapshot;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink returned HTTP {0}")]
    Status(u16),

    #[error("send timed out")]
    Timeout,
}

/// Where alert text ends up. Best-effort: implementations log failures and
/// never retry, so a slow or broken sink cannot stall a scan loop.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&self, text: &str);
}

/// Telegram notification service. Failures are logged but never block the main flow.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(http: reqwest::Client, bot_token: String, chat_id: String) -> Self {
        Self {
            http,
            bot_token,
            chat_id,
        }
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "disable_web_page_preview": true,
        });

        let resp = tokio::time::timeout(SEND_TIMEOUT, self.http.post(&url).json(&body).send())
            .await
            .map_err(|_| NotifyError::Timeout)??;

        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn emit(&self, text: &str) {
        if let Err(e) = self.send(text).await {
            counter!("notifications_failed_total").increment(1);
            tracing::warn!(error = %e, "Failed to send Telegram notification");
        }
    }
}

/// Sink used when no chat transport is configured: alerts go to the log.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn emit(&self, text: &str) {
        tracing::info!(alert = %text, "Alert");
    }
}

/// Format a momentum alert.
pub fn format_momentum_alert(signal: &Signal) -> String {
    let c = &signal.candidate;
    let time = signal.timestamp.format("%H:%M:%S UTC");

    if let (AlertKind::Theme, Some(theme)) = (c.kind, &c.theme) {
        let mut msg = format!(
            "{} Theme surge [{}] {} {:+.1}% ({} advancers)\n",
            signal.tier.badge(),
            signal.tier.as_str().to_uppercase(),
            theme.name,
            c.change_percent,
            theme.advancers,
        );
        for (rank, leader) in theme.leaders.iter().enumerate() {
            msg.push_str(&format!(
                "  {}. {} ({}) {:+.1}%\n",
                rank + 1,
                leader.name,
                leader.code,
                leader.change_percent
            ));
        }
        msg.push_str(&format!("⏰ {time}"));
        return msg;
    }

    if c.kind == AlertKind::ProgramFlow {
        return format!(
            "{} Program buying [{}]\n{} ({})\nNet buy: {} (1e6 KRW)\n{}\n⏰ {}",
            signal.tier.badge(),
            signal.tier.as_str().to_uppercase(),
            c.display_name,
            c.ticker,
            c.net_buy.unwrap_or(0),
            signal.reason,
            time,
        );
    }

    let ratio = c
        .volume_ratio
        .map(|r| format!("{r:.1}x"))
        .unwrap_or_else(|| "n/a".into());

    format!(
        "{} Surge [{}] {}\n{} ({})\nPrice: {}\nChange: {:+.2}%\nVolume ratio: {}\nReason: {}\nSource: {} / {}\n⏰ {}",
        signal.tier.badge(),
        signal.tier.as_str().to_uppercase(),
        c.market,
        c.display_name,
        c.ticker,
        c.price.normalize(),
        c.change_percent,
        ratio,
        signal.reason,
        signal.source_mode,
        c.provider_id,
        time,
    )
}

/// Format a news alert for a headline that cleared the promotion threshold.
pub fn format_news_alert(item: &NewsItem, analysis: &AnalysisResult) -> String {
    let mut msg = format!(
        "📰 News signal [{}] score {:.1}/10 ({})\n{}\n",
        item.market,
        analysis.score,
        if analysis.certainty.is_empty() { "n/a" } else { analysis.certainty.as_str() },
        item.title,
    );

    if !analysis.summary.is_empty() {
        msg.push_str(&format!("{}\n", analysis.summary));
    }
    if let Some(t) = analysis.top_ticker.as_deref().or(analysis.ticker_in_news.as_deref()) {
        msg.push_str(&format!("Ticker: {t}\n"));
    }
    for rec in analysis.recommendations.iter().take(3) {
        if rec.reason.is_empty() {
            msg.push_str(&format!("  • {} {}\n", rec.ticker, rec.name));
        } else {
            msg.push_str(&format!("  • {} {}: {}\n", rec.ticker, rec.name, rec.reason));
        }
    }
    msg.push_str(&format!("{} | {}", item.source, item.url));
    msg
}

/// Session summary: totals, per-market and per-tier counts, provider health.
pub fn format_stats_summary(stats: &StatsSnapshot, now: DateTime<Utc>) -> String {
    let uptime = now - stats.session_start;
    let mut msg = format!(
        "📈 Session summary ({}h {}m)\nAlerts: {}\n",
        uptime.num_hours(),
        uptime.num_minutes() % 60,
        stats.total_alerts,
    );

    for (market, n) in &stats.alerts_by_market {
        msg.push_str(&format!("  {market}: {n}\n"));
    }
    for (tier, n) in &stats.alerts_by_tier {
        msg.push_str(&format!("  {} {}: {n}\n", tier.badge(), tier.as_str()));
    }
    if stats.total_alerts > 0 {
        msg.push_str(&format!(
            "Avg change: {:+.2}% | Max: {:+.2}%\n",
            stats.avg_change_percent, stats.max_change_percent
        ));
    }
    for (provider, c) in &stats.providers {
        msg.push_str(&format!(
            "  {provider}: {} ok / {} empty / {} err / {} timeout\n",
            c.success, c.empty, c.error, c.timeout
        ));
    }
    msg.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Market, Priority, Recommendation, SourceMode};
    use chrono::Utc;
    use rust_decimal::Decimal;

    #[test]
    fn test_momentum_alert_unknown_ratio() {
        let signal = Signal {
            candidate: Candidate::surge("ABCD", "Abcd Inc", Market::Us, "finviz")
                .with_move(Decimal::new(412, 2), 35.2)
                .with_volume(1_000_000, None),
            reason: "finviz gainer".into(),
            tier: Priority::Medium,
            timestamp: Utc::now(),
            source_mode: SourceMode::FullMarket,
        };

        let text = format_momentum_alert(&signal);
        assert!(text.contains("Volume ratio: n/a"));
        assert!(text.contains("+35.20%"));
        assert!(text.contains("MEDIUM"));
        assert!(!text.contains("0.0x"));
    }

    #[test]
    fn test_theme_alert_ranks_leaders() {
        let info = crate::models::ThemeInfo {
            name: "Robotics".into(),
            advancers: 9,
            leaders: vec![
                crate::models::ThemeLeader {
                    code: "000100".into(),
                    name: "Alpha".into(),
                    price: Decimal::from(9_000),
                    change_percent: 18.2,
                },
                crate::models::ThemeLeader {
                    code: "000200".into(),
                    name: "Beta".into(),
                    price: Decimal::from(4_000),
                    change_percent: 7.5,
                },
            ],
        };
        let signal = Signal {
            candidate: Candidate::theme(info, Market::Kr, 4.3, "naver_theme"),
            reason: String::new(),
            tier: Priority::Low,
            timestamp: Utc::now(),
            source_mode: SourceMode::FullMarket,
        };

        let text = format_momentum_alert(&signal);
        assert!(text.contains("Theme surge [LOW] Robotics +4.3% (9 advancers)"));
        assert!(text.contains("1. Alpha (000100) +18.2%"));
        assert!(text.contains("2. Beta (000200) +7.5%"));
    }

    #[test]
    fn test_news_alert_lists_recommendations() {
        let item = NewsItem {
            title: "Abcd wins FDA approval".into(),
            url: "https://wire.example/abcd".into(),
            source: "Wire".into(),
            market: Market::Us,
            published_at: Utc::now(),
            is_priority: false,
        };
        let analysis = AnalysisResult {
            score: 9.0,
            certainty: "confirmed".into(),
            summary: String::new(),
            top_ticker: Some("ABCD".into()),
            ticker_in_news: None,
            top_ticker_market: Some(Market::Us),
            recommendations: vec![Recommendation {
                ticker: "WXYZ".into(),
                name: "Wxyz".into(),
                reason: "partner".into(),
            }],
        };

        let text = format_news_alert(&item, &analysis);
        assert!(text.contains("score 9.0/10"));
        assert!(text.contains("Ticker: ABCD"));
        assert!(text.contains("WXYZ Wxyz: partner"));
        assert!(text.ends_with("https://wire.example/abcd"));
    }

    #[tokio::test]
    async fn test_stats_summary() {
        let stats = crate::tracking::StatsAggregator::new();
        let empty = format_stats_summary(&stats.summary().await, Utc::now());
        assert!(empty.contains("Alerts: 0"));
        assert!(!empty.contains("Avg change"));

        stats
            .record(&Signal {
                candidate: Candidate::surge("ABCD", "Abcd", Market::Us, "finviz")
                    .with_move(Decimal::from(5), 12.5)
                    .with_volume(10, Some(6.0)),
                reason: "test".into(),
                tier: Priority::Medium,
                timestamp: Utc::now(),
                source_mode: SourceMode::FullMarket,
            })
            .await;
        let text = format_stats_summary(&stats.summary().await, Utc::now());
        assert!(text.contains("Alerts: 1"));
        assert!(text.contains("US: 1"));
        assert!(text.contains("medium: 1"));
        assert!(text.contains("Max: +12.50%"));
    }
}
