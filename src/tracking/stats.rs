use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::{AttemptStatus, Market, PollMode, Priority, ProviderAttempt, Signal};

/// Per-provider attempt tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderCounts {
    pub success: u64,
    pub empty: u64,
    pub error: u64,
    pub timeout: u64,
}

impl ProviderCounts {
    fn bump(&mut self, status: AttemptStatus) {
        match status {
            AttemptStatus::Success => self.success += 1,
            AttemptStatus::Empty => self.empty += 1,
            AttemptStatus::Error => self.error += 1,
            AttemptStatus::Timeout => self.timeout += 1,
        }
    }
}

/// Point-in-time copy of the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub session_start: DateTime<Utc>,
    pub total_alerts: u64,
    pub alerts_by_market: BTreeMap<Market, u64>,
    pub alerts_by_tier: BTreeMap<Priority, u64>,
    pub avg_change_percent: f64,
    pub max_change_percent: f64,
    pub providers: BTreeMap<String, ProviderCounts>,
    /// Keyed `"{market}:{mode}"`.
    pub chain_exhausted: BTreeMap<String, u64>,
}

/// Running counters over emitted signals and provider attempts. Reset only
/// by restarting the process.
#[derive(Clone)]
pub struct StatsAggregator {
    inner: Arc<Mutex<StatsSnapshot>>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatsSnapshot {
                session_start: Utc::now(),
                total_alerts: 0,
                alerts_by_market: BTreeMap::new(),
                alerts_by_tier: BTreeMap::new(),
                avg_change_percent: 0.0,
                max_change_percent: 0.0,
                providers: BTreeMap::new(),
                chain_exhausted: BTreeMap::new(),
            })),
        }
    }

    pub async fn record(&self, signal: &Signal) {
        let change = signal.candidate.change_percent.abs();
        let change = if change.is_finite() { change } else { 0.0 };

        let mut s = self.inner.lock().await;
        s.total_alerts += 1;
        *s.alerts_by_market.entry(signal.candidate.market).or_insert(0) += 1;
        *s.alerts_by_tier.entry(signal.tier).or_insert(0) += 1;

        if change > s.max_change_percent {
            s.max_change_percent = change;
        }
        let n = s.total_alerts as f64;
        // Rounding in the running mean can drift a few ulps past the max.
        s.avg_change_percent = ((s.avg_change_percent * (n - 1.0) + change) / n).min(s.max_change_percent);
    }

    pub async fn record_provider_attempt(&self, attempt: &ProviderAttempt) {
        counter!(
            "provider_attempts_total",
            "provider" => attempt.provider_id.clone(),
            "status" => attempt.status.as_str()
        )
        .increment(1);

        let mut s = self.inner.lock().await;
        s.providers
            .entry(attempt.provider_id.clone())
            .or_default()
            .bump(attempt.status);
    }

    pub async fn record_chain_exhausted(&self, market: Market, mode: PollMode) {
        counter!(
            "chain_exhausted_total",
            "market" => market.as_str(),
            "mode" => mode.as_str()
        )
        .increment(1);

        let mut s = self.inner.lock().await;
        *s.chain_exhausted.entry(format!("{market}:{mode}")).or_insert(0) += 1;
    }

    pub async fn summary(&self) -> StatsSnapshot {
        self.inner.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, SourceMode};
    use rust_decimal::Decimal;

    fn signal(market: Market, change: f64, tier: Priority) -> Signal {
        Signal {
            candidate: Candidate::surge("ABCD", "Abcd Inc", market, "test")
                .with_move(Decimal::from(10), change),
            reason: "test".into(),
            tier,
            timestamp: Utc::now(),
            source_mode: SourceMode::FullMarket,
        }
    }

    #[tokio::test]
    async fn test_empty_summary_has_no_nan() {
        let stats = StatsAggregator::new();
        let s = stats.summary().await;
        assert_eq!(s.total_alerts, 0);
        assert_eq!(s.avg_change_percent, 0.0);
        assert_eq!(s.max_change_percent, 0.0);
    }

    #[tokio::test]
    async fn test_running_average_and_max() {
        let stats = StatsAggregator::new();
        let changes = [12.0, 30.0, -18.0, 10.0];

        for (i, c) in changes.iter().enumerate() {
            stats.record(&signal(Market::Us, *c, Priority::Medium)).await;
            let s = stats.summary().await;
            assert_eq!(s.total_alerts, i as u64 + 1);
            assert!(s.avg_change_percent >= 0.0);
            assert!(s.avg_change_percent <= s.max_change_percent);
        }

        let s = stats.summary().await;
        assert!((s.avg_change_percent - 17.5).abs() < 1e-9);
        assert_eq!(s.max_change_percent, 30.0);
        assert_eq!(s.alerts_by_market.get(&Market::Us), Some(&4));
        assert_eq!(s.alerts_by_tier.get(&Priority::Medium), Some(&4));
    }

    #[tokio::test]
    async fn test_repeated_change_keeps_average_within_max() {
        let stats = StatsAggregator::new();
        for _ in 0..10 {
            stats.record(&signal(Market::Us, 0.1, Priority::Medium)).await;
            let s = stats.summary().await;
            assert!(s.avg_change_percent >= 0.0);
            assert!(s.avg_change_percent <= s.max_change_percent);
        }
        assert!((stats.summary().await.avg_change_percent - 0.1).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_provider_attempts_by_status() {
        let stats = StatsAggregator::new();
        for status in [AttemptStatus::Empty, AttemptStatus::Success, AttemptStatus::Success] {
            stats
                .record_provider_attempt(&ProviderAttempt {
                    provider_id: "finviz".into(),
                    status,
                    row_count: 0,
                    elapsed_ms: 5,
                })
                .await;
        }

        let s = stats.summary().await;
        let finviz = &s.providers["finviz"];
        assert_eq!(finviz.success, 2);
        assert_eq!(finviz.empty, 1);
        assert_eq!(finviz.error, 0);
    }

    #[tokio::test]
    async fn test_concurrent_records() {
        let stats = StatsAggregator::new();
        let mut handles = Vec::new();
        for i in 0..20 {
            let stats = stats.clone();
            handles.push(tokio::spawn(async move {
                stats.record(&signal(Market::Kr, 10.0 + i as f64, Priority::High)).await;
                stats.summary().await
            }));
        }
        for h in handles {
            let s = h.await.unwrap();
            assert!(s.avg_change_percent.is_finite());
            assert!(s.avg_change_percent <= s.max_change_percent);
        }
        assert_eq!(stats.summary().await.total_alerts, 20);
    }
}
